//! Common traits for repositories and services
//!
//! Defines the storage seams the services are written against. Every backend
//! (PostgreSQL, in-memory) implements the full set; services take any
//! [`LedgerStore`].

use crate::catalog::Catalog;
use crate::models::{
    GenerationOutcome, GenerationRequest, ImageModel, LedgerTransaction, Report, ReportWindow,
    User,
};
use crate::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

/// One all-or-nothing unit of ledger work
///
/// Writes staged through a unit become visible only after [`commit`]. A unit
/// that is dropped or rolled back leaves no trace. `load_credits` locks the
/// user's balance for the remainder of the unit.
///
/// [`commit`]: LedgerUnit::commit
#[async_trait]
pub trait LedgerUnit: Send + Sized {
    /// Read and lock a user's balance, `None` when the user does not exist
    async fn load_credits(&mut self, user_id: &str) -> AppResult<Option<i64>>;

    /// Overwrite a user's balance
    async fn store_credits(&mut self, user_id: &str, credits: i64) -> AppResult<()>;

    /// Append a ledger transaction
    async fn append_transaction(&mut self, transaction: &LedgerTransaction) -> AppResult<()>;

    /// Create a generation request document
    async fn insert_generation_request(&mut self, request: &GenerationRequest) -> AppResult<()>;

    /// Whether a refund was already recorded for `request_id`
    async fn has_refund(&mut self, request_id: Uuid) -> AppResult<bool>;

    /// Make every staged write durable
    ///
    /// Fails with `AppError::WriteConflict` when a concurrent unit won.
    async fn commit(self) -> AppResult<()>;

    /// Discard every staged write
    async fn rollback(self) -> AppResult<()>;
}

/// Store able to open atomic units
#[async_trait]
pub trait AtomicStore: Send + Sync {
    type Unit: LedgerUnit + 'static;

    /// Open a new unit
    async fn begin(&self) -> AppResult<Self::Unit>;
}

/// User read access
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>>;
}

/// Ledger transaction read access
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// All transactions of a user, newest first
    async fn transactions_for_user(&self, user_id: &str) -> AppResult<Vec<LedgerTransaction>>;
}

/// Generation request persistence outside the atomic unit
#[async_trait]
pub trait GenerationRequestRepository: Send + Sync {
    async fn find_generation_request(&self, id: Uuid) -> AppResult<Option<GenerationRequest>>;

    /// Transition a pending request to `Completed`
    async fn mark_completed(&self, id: Uuid, image_url: &str) -> AppResult<()>;

    /// Transition a pending request to `Failed`
    async fn mark_failed(&self, id: Uuid, error: &str) -> AppResult<()>;

    /// Stream every request created inside `window`
    fn requests_in_window(
        &self,
        window: ReportWindow,
    ) -> BoxStream<'_, AppResult<GenerationRequest>>;
}

/// Weekly report persistence
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Report covering the latest reporting period
    async fn latest_report(&self) -> AppResult<Option<Report>>;

    /// Latest report whose period ended strictly before `window_end`,
    /// skipping `exclude_id`
    async fn report_before(
        &self,
        window_end: DateTime<Utc>,
        exclude_id: &str,
    ) -> AppResult<Option<Report>>;

    /// Insert or overwrite a report by id
    async fn save_report(&self, report: &Report) -> AppResult<()>;
}

/// Source the catalog is loaded from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_catalog(&self) -> AppResult<Catalog>;
}

/// Backend liveness probe
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> AppResult<()>;
}

/// Everything the services need from a backend
pub trait LedgerStore:
    AtomicStore
    + UserRepository
    + TransactionRepository
    + GenerationRequestRepository
    + ReportRepository
    + CatalogSource
    + StoreHealth
    + 'static
{
}

impl<T> LedgerStore for T where
    T: AtomicStore
        + UserRepository
        + TransactionRepository
        + GenerationRequestRepository
        + ReportRepository
        + CatalogSource
        + StoreHealth
        + 'static
{
}

/// External image generator
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, model: ImageModel) -> GenerationOutcome;
}
