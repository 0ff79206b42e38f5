//! Health probe

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use canvas_core::traits::{LedgerStore, StoreHealth};
use serde_json::json;
use tracing::error;

/// GET /api/v1/health
pub async fn health_check<S: LedgerStore + 'static>(state: web::Data<AppState<S>>) -> HttpResponse {
    match state.store.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "canvas-billing",
            "backend": state.backend,
            "version": env!("CARGO_PKG_VERSION"),
        })),
        Err(e) => {
            error!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "service": "canvas-billing",
                "backend": state.backend,
                "error": e.to_string(),
            }))
        }
    }
}

/// Configure the health route
pub fn configure<S: LedgerStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check::<S>));
}
