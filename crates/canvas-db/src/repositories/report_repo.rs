//! Report repository implementation
//!
//! Breakdowns and anomalies are stored as JSONB.

use super::{db_error, PgStore};
use canvas_core::{
    models::{Breakdown, Report},
    traits::ReportRepository,
    AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tracing::{debug, info, instrument};

#[async_trait]
impl ReportRepository for PgStore {
    #[instrument(skip(self))]
    async fn latest_report(&self) -> AppResult<Option<Report>> {
        let row = sqlx::query_as::<sqlx::Postgres, ReportRow>(
            r#"
            SELECT id, window_start, window_end, total_requests,
                   total_credits_spent, total_credits_refunded, success_rate,
                   by_model, by_style, by_size, anomalies, generated_at
            FROM reports
            ORDER BY window_end DESC, generated_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_error("Failed to load latest report", e))?;

        debug!("Latest report: {:?}", row.as_ref().map(|r| &r.id));
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn report_before(
        &self,
        window_end: DateTime<Utc>,
        exclude_id: &str,
    ) -> AppResult<Option<Report>> {
        let row = sqlx::query_as::<sqlx::Postgres, ReportRow>(
            r#"
            SELECT id, window_start, window_end, total_requests,
                   total_credits_spent, total_credits_refunded, success_rate,
                   by_model, by_style, by_size, anomalies, generated_at
            FROM reports
            WHERE window_end < $1 AND id <> $2
            ORDER BY window_end DESC, generated_at DESC
            LIMIT 1
            "#,
        )
        .bind(window_end)
        .bind(exclude_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_error("Failed to load previous report", e))?;

        debug!("Previous report: {:?}", row.as_ref().map(|r| &r.id));
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, report), fields(report_id = %report.id))]
    async fn save_report(&self, report: &Report) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reports (
                id, window_start, window_end, total_requests,
                total_credits_spent, total_credits_refunded, success_rate,
                by_model, by_style, by_size, anomalies, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                window_start = EXCLUDED.window_start,
                window_end = EXCLUDED.window_end,
                total_requests = EXCLUDED.total_requests,
                total_credits_spent = EXCLUDED.total_credits_spent,
                total_credits_refunded = EXCLUDED.total_credits_refunded,
                success_rate = EXCLUDED.success_rate,
                by_model = EXCLUDED.by_model,
                by_style = EXCLUDED.by_style,
                by_size = EXCLUDED.by_size,
                anomalies = EXCLUDED.anomalies,
                generated_at = EXCLUDED.generated_at
            "#,
        )
        .bind(&report.id)
        .bind(report.window_start)
        .bind(report.window_end)
        .bind(report.total_requests as i64)
        .bind(report.total_credits_spent)
        .bind(report.total_credits_refunded)
        .bind(report.success_rate)
        .bind(Json(&report.by_model))
        .bind(Json(&report.by_style))
        .bind(Json(&report.by_size))
        .bind(Json(&report.anomalies))
        .bind(report.generated_at)
        .execute(self.pool())
        .await
        .map_err(|e| db_error("Failed to save report", e))?;

        info!("Saved report {}", report.id);
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    total_requests: i64,
    total_credits_spent: i64,
    total_credits_refunded: i64,
    success_rate: f64,
    by_model: Json<Breakdown>,
    by_style: Json<Breakdown>,
    by_size: Json<Breakdown>,
    anomalies: Json<Vec<String>>,
    generated_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            window_start: row.window_start,
            window_end: row.window_end,
            total_requests: row.total_requests.max(0) as u64,
            total_credits_spent: row.total_credits_spent,
            total_credits_refunded: row.total_credits_refunded,
            success_rate: row.success_rate,
            by_model: row.by_model.0,
            by_style: row.by_style.0,
            by_size: row.by_size.0,
            anomalies: row.anomalies.0,
            generated_at: row.generated_at,
        }
    }
}
