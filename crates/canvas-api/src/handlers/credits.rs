//! Credit balance handlers

use crate::dto::{CreditsQuery, CreditsResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use canvas_core::traits::LedgerStore;
use canvas_core::AppError;
use tracing::{debug, instrument};

/// Current balance and transaction history of a user
///
/// GET /api/v1/credits?userId=
#[instrument(skip(state))]
pub async fn get_user_credits<S: LedgerStore + 'static>(
    state: web::Data<AppState<S>>,
    query: web::Query<CreditsQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("userId parameter is required".to_string()))?;

    let history = state.ledger.history(user_id).await?;

    debug!(
        user_id,
        credits = history.current_credits,
        transactions = history.transactions.len(),
        "Credits retrieved"
    );

    Ok(HttpResponse::Ok().json(CreditsResponse::from(history)))
}

/// Configure credit routes
pub fn configure<S: LedgerStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/credits", web::get().to(get_user_credits::<S>));
}
