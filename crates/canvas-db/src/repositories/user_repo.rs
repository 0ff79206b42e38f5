//! User repository implementation

use super::{db_error, PgStore};
use canvas_core::{models::User, traits::UserRepository, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

#[async_trait]
impl UserRepository for PgStore {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        debug!("Finding user by id: {}", user_id);

        let row = sqlx::query_as::<sqlx::Postgres, UserRow>(
            r#"
            SELECT id, credits, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| db_error("Failed to find user", e))?;

        Ok(row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    credits: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            credits: row.credits,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
