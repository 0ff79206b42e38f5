//! Weekly report handlers

use crate::dto::{ApiResponse, WeeklyReportQuery};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use canvas_core::traits::LedgerStore;
use canvas_core::AppError;
use tracing::{info, instrument};

/// Generate the weekly report now
///
/// POST /api/v1/reports/weekly
#[instrument(skip(state))]
pub async fn trigger_weekly_report<S: LedgerStore + 'static>(
    state: web::Data<AppState<S>>,
    query: web::Query<WeeklyReportQuery>,
) -> Result<HttpResponse, AppError> {
    let report = state.reports.generate_weekly(query.window_end()).await?;

    info!(report_id = %report.id, "Weekly report triggered manually");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        report,
        "Weekly report generated",
    )))
}

/// Most recent report
///
/// GET /api/v1/reports/latest
#[instrument(skip(state))]
pub async fn get_latest_report<S: LedgerStore + 'static>(
    state: web::Data<AppState<S>>,
) -> Result<HttpResponse, AppError> {
    let report = state.reports.latest().await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Configure report routes
pub fn configure<S: LedgerStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reports")
            .route("/weekly", web::post().to(trigger_weekly_report::<S>))
            .route("/latest", web::get().to(get_latest_report::<S>)),
    );
}
