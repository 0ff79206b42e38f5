//! Atomic ledger unit on a PostgreSQL transaction
//!
//! The user's balance row is locked with `SELECT ... FOR UPDATE` on first
//! read, so concurrent units for the same user serialize while units for
//! different users never contend.

use super::{db_error, PgStore};
use canvas_core::{
    models::{GenerationRequest, LedgerTransaction, TransactionType},
    traits::{AtomicStore, LedgerUnit},
    AppError, AppResult,
};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// One open PostgreSQL transaction
pub struct PgLedgerUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AtomicStore for PgStore {
    type Unit = PgLedgerUnit;

    async fn begin(&self) -> AppResult<PgLedgerUnit> {
        let tx = self.pool().begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;
        Ok(PgLedgerUnit { tx })
    }
}

#[async_trait]
impl LedgerUnit for PgLedgerUnit {
    #[instrument(skip(self))]
    async fn load_credits(&mut self, user_id: &str) -> AppResult<Option<i64>> {
        debug!("Locking balance of user {}", user_id);

        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT credits
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock user balance", e))?;

        Ok(row.map(|(credits,)| credits))
    }

    #[instrument(skip(self))]
    async fn store_credits(&mut self, user_id: &str, credits: i64) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET credits = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(credits)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update balance", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, transaction), fields(request_id = %transaction.generation_request_id))]
    async fn append_transaction(&mut self, transaction: &LedgerTransaction) -> AppResult<()> {
        debug!(
            "Appending {} of {} credits for user {}",
            transaction.transaction_type, transaction.credits, transaction.user_id
        );

        sqlx::query(
            r#"
            INSERT INTO ledger_transactions (
                id, user_id, transaction_type, credits,
                generation_request_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.user_id)
        .bind(transaction.transaction_type.to_string())
        .bind(transaction.credits)
        .bind(transaction.generation_request_id)
        .bind(transaction.timestamp)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to append ledger transaction", e))?;

        Ok(())
    }

    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn insert_generation_request(&mut self, request: &GenerationRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_requests (
                id, user_id, model, style, color, size, prompt,
                cost, status, image_url, error, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(request.id)
        .bind(&request.user_id)
        .bind(request.model.as_str())
        .bind(&request.style)
        .bind(&request.color)
        .bind(&request.size)
        .bind(&request.prompt)
        .bind(request.cost)
        .bind(request.status.to_string())
        .bind(&request.image_url)
        .bind(&request.error)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to create generation request", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn has_refund(&mut self, request_id: Uuid) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM ledger_transactions
                WHERE generation_request_id = $1
                  AND transaction_type = $2
            )
            "#,
        )
        .bind(request_id)
        .bind(TransactionType::Refund.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to look up refund", e))?;

        Ok(exists)
    }

    async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await.map_err(|e| {
            error!("Failed to roll back transaction: {}", e);
            AppError::Transaction(format!("Failed to roll back transaction: {}", e))
        })
    }
}
