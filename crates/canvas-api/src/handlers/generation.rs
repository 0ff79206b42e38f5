//! Generation request handlers

use crate::dto::{CreateGenerationRequest, GenerationCreatedResponse, GenerationRequestResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use canvas_core::traits::LedgerStore;
use canvas_core::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Charge credits and run one generation
///
/// POST /api/v1/generation-requests
#[instrument(skip(state, req))]
pub async fn create_generation_request<S: LedgerStore + 'static>(
    state: web::Data<AppState<S>>,
    req: web::Json<CreateGenerationRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Generation request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let receipt = state.lifecycle.create(req.into_inner().into()).await?;

    info!(
        request_id = %receipt.request_id,
        cost = receipt.deducted_credits,
        "Generation request completed"
    );

    Ok(HttpResponse::Created().json(GenerationCreatedResponse::from(receipt)))
}

/// Get a generation request by id
///
/// GET /api/v1/generation-requests/{id}
#[instrument(skip(state))]
pub async fn get_generation_request<S: LedgerStore + 'static>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let request = state.lifecycle.find(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(GenerationRequestResponse::from(request)))
}

/// Configure generation request routes
pub fn configure<S: LedgerStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/generation-requests")
            .route("", web::post().to(create_generation_request::<S>))
            .route("/{id}", web::get().to(get_generation_request::<S>)),
    );
}
