//! Catalog handlers

use crate::dto::ApiResponse;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use canvas_core::traits::LedgerStore;
use canvas_core::AppError;
use tracing::{info, instrument};

/// Catalog snapshot in use
///
/// GET /api/v1/catalog
pub async fn get_catalog<S: LedgerStore + 'static>(state: web::Data<AppState<S>>) -> HttpResponse {
    let catalog = state.catalog.current();
    HttpResponse::Ok().json(catalog.as_ref())
}

/// Reload the catalog from the store
///
/// POST /api/v1/catalog/refresh
#[instrument(skip(state))]
pub async fn refresh_catalog<S: LedgerStore + 'static>(
    state: web::Data<AppState<S>>,
) -> Result<HttpResponse, AppError> {
    let catalog = state.catalog.refresh(state.store.as_ref()).await?;

    info!(sizes = catalog.sizes.len(), "Catalog reloaded on request");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        catalog.as_ref(),
        "Catalog refreshed",
    )))
}

/// Configure catalog routes
pub fn configure<S: LedgerStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/catalog")
            .route("", web::get().to(get_catalog::<S>))
            .route("/refresh", web::post().to(refresh_catalog::<S>)),
    );
}
