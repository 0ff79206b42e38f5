//! Repository implementations
//!
//! This module contains the PostgreSQL implementation of every storage trait
//! defined in canvas-core. A single `PgStore` owns the pool; each file adds
//! the impl for one concern.

pub mod catalog_repo;
pub mod generation_repo;
pub mod ledger_unit;
pub mod report_repo;
pub mod transaction_repo;
pub mod user_repo;

pub use ledger_unit::PgLedgerUnit;

use canvas_core::{traits::StoreHealth, AppError, AppResult};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

/// Serialization failure
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// Deadlock detected
const SQLSTATE_DEADLOCK: &str = "40P01";
/// Unique index that admits one refund per generation request
pub(crate) const ONE_REFUND_PER_REQUEST: &str = "ledger_transactions_one_refund_per_request";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> AppResult<()> {
        crate::pool::health_check(&self.pool).await
    }
}

/// Map a sqlx error, classifying retryable write conflicts
///
/// A concurrent refund for the same request losing the unique-index race is
/// a conflict too: the retried unit then sees the winner's refund.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        let code = db_err.code();
        let conflict = matches!(
            code.as_deref(),
            Some(SQLSTATE_SERIALIZATION_FAILURE) | Some(SQLSTATE_DEADLOCK)
        ) || db_err.constraint() == Some(ONE_REFUND_PER_REQUEST);

        if conflict {
            return AppError::WriteConflict(format!("{}: {}", context, db_err.message()));
        }
    }

    error!("Database error ({}): {}", context, err);
    AppError::Database(format!("{}: {}", context, err))
}
