//! Generation request repository implementation
//!
//! Requests are created inside the deduction unit; status transitions happen
//! here as separate single-statement updates guarded on `status = 'pending'`.

use super::{db_error, PgStore};
use canvas_core::{
    models::{GenerationRequest, GenerationStatus, ImageModel, ReportWindow},
    traits::GenerationRequestRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

impl PgStore {
    async fn finalize(
        &self,
        id: Uuid,
        status: GenerationStatus,
        image_url: Option<&str>,
        error: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE generation_requests
            SET status = $2,
                image_url = $3,
                error = $4,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(image_url)
        .bind(error)
        .execute(self.pool())
        .await
        .map_err(|e| db_error("Failed to update generation request", e))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.find_generation_request(id).await? {
            None => Err(AppError::GenerationRequestNotFound(id.to_string())),
            Some(existing) => {
                warn!(
                    "Refusing {} -> {} for generation request {}",
                    existing.status, status, id
                );
                Err(AppError::Internal(format!(
                    "Generation request {} is already {}",
                    id, existing.status
                )))
            }
        }
    }
}

#[async_trait]
impl GenerationRequestRepository for PgStore {
    #[instrument(skip(self))]
    async fn find_generation_request(&self, id: Uuid) -> AppResult<Option<GenerationRequest>> {
        debug!("Finding generation request {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, GenerationRequestRow>(
            r#"
            SELECT id, user_id, model, style, color, size, prompt, cost,
                   status, image_url, error, created_at, updated_at
            FROM generation_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_error("Failed to find generation request", e))?;

        row.map(GenerationRequest::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn mark_completed(&self, id: Uuid, image_url: &str) -> AppResult<()> {
        self.finalize(id, GenerationStatus::Completed, Some(image_url), None)
            .await
    }

    #[instrument(skip(self))]
    async fn mark_failed(&self, id: Uuid, error: &str) -> AppResult<()> {
        self.finalize(id, GenerationStatus::Failed, None, Some(error))
            .await
    }

    fn requests_in_window(
        &self,
        window: ReportWindow,
    ) -> BoxStream<'_, AppResult<GenerationRequest>> {
        debug!(
            "Streaming generation requests from {} to {}",
            window.start, window.end
        );

        sqlx::query_as::<sqlx::Postgres, GenerationRequestRow>(
            r#"
            SELECT id, user_id, model, style, color, size, prompt, cost,
                   status, image_url, error, created_at, updated_at
            FROM generation_requests
            WHERE created_at >= $1
              AND created_at < $2
            ORDER BY created_at, id
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch(self.pool())
        .map(|row| {
            row.map_err(|e| db_error("Failed to stream generation requests", e))
                .and_then(GenerationRequest::try_from)
        })
        .boxed()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GenerationRequestRow {
    id: Uuid,
    user_id: String,
    model: String,
    style: String,
    color: String,
    size: String,
    prompt: Option<String>,
    cost: i64,
    status: String,
    image_url: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GenerationRequestRow> for GenerationRequest {
    type Error = AppError;

    fn try_from(row: GenerationRequestRow) -> Result<Self, Self::Error> {
        let model = ImageModel::from_str(&row.model).ok_or_else(|| {
            AppError::Database(format!("Unknown model '{}' on request {}", row.model, row.id))
        })?;
        let status = GenerationStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Database(format!("Unknown status '{}' on request {}", row.status, row.id))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            model,
            style: row.style,
            color: row.color,
            size: row.size,
            prompt: row.prompt,
            cost: row.cost,
            status,
            image_url: row.image_url,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
