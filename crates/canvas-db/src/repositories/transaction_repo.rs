//! Ledger transaction repository implementation
//!
//! Transactions are only ever written through a `PgLedgerUnit`; this file
//! covers the history read.

use super::{db_error, PgStore};
use canvas_core::{
    models::{LedgerTransaction, TransactionType},
    traits::TransactionRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

#[async_trait]
impl TransactionRepository for PgStore {
    #[instrument(skip(self))]
    async fn transactions_for_user(&self, user_id: &str) -> AppResult<Vec<LedgerTransaction>> {
        debug!("Loading ledger history for user {}", user_id);

        let rows = sqlx::query_as::<sqlx::Postgres, TransactionRow>(
            r#"
            SELECT id, user_id, transaction_type, credits,
                   generation_request_id, created_at
            FROM ledger_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| db_error("Failed to fetch ledger transactions", e))?;

        rows.into_iter().map(LedgerTransaction::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: String,
    transaction_type: String,
    credits: i64,
    generation_request_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for LedgerTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let transaction_type = TransactionType::from_str(&row.transaction_type).ok_or_else(|| {
            AppError::Database(format!(
                "Unknown transaction type '{}' on {}",
                row.transaction_type, row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            transaction_type,
            credits: row.credits,
            generation_request_id: row.generation_request_id,
            timestamp: row.created_at,
        })
    }
}
