//! HTTP request handlers
//!
//! Every handler is generic over the backing store so the same routes serve
//! the PostgreSQL and in-memory backends.

pub mod catalog;
pub mod credits;
pub mod generation;
pub mod health;
pub mod report;

use crate::dto::extractor_error_body;
use actix_web::{error::InternalError, web, HttpResponse};
use canvas_core::traits::LedgerStore;
use tracing::warn;

pub use catalog::configure as configure_catalog;
pub use credits::configure as configure_credits;
pub use generation::configure as configure_generation_requests;
pub use health::configure as configure_health;
pub use report::configure as configure_reports;

/// Mount every `/api/v1` route and the extractor error handlers
///
/// Expects `web::Data<AppState<S>>` to be registered on the app.
pub fn configure<S: LedgerStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(
            web::scope("/api/v1")
                .configure(configure_health::<S>)
                .configure(configure_generation_requests::<S>)
                .configure(configure_credits::<S>)
                .configure(configure_catalog::<S>)
                .configure(configure_reports::<S>),
        );
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        warn!("Rejected request body: {}", message);
        InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(extractor_error_body("invalid_json", &message)),
        )
        .into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(extractor_error_body("invalid_query", &message)),
        )
        .into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(extractor_error_body("invalid_path", &message)),
        )
        .into()
    })
}
