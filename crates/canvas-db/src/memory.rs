//! In-memory store
//!
//! Implements the same storage contract as `PgStore` in process memory. Units
//! hold an owned lock on the whole state for their lifetime and stage their
//! writes, which reach the shared state only on commit.
//!
//! Every unit serializes behind the single state lock, so units for
//! different users wait on each other here. PostgreSQL units only lock the
//! user row they touch.
//!
//! Used by the test suites and for local runs without `database.url`.

use canvas_core::{
    models::{
        GenerationRequest, GenerationStatus, LedgerTransaction, Report, ReportWindow,
        TransactionType, User,
    },
    traits::{
        AtomicStore, CatalogSource, GenerationRequestRepository, LedgerUnit, ReportRepository,
        StoreHealth, TransactionRepository, UserRepository,
    },
    AppError, AppResult, Catalog,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<String, User>,
    /// Append order equals commit order
    transactions: Vec<LedgerTransaction>,
    requests: HashMap<Uuid, GenerationRequest>,
    reports: BTreeMap<String, Report>,
}

/// Injected faults
#[derive(Debug, Default)]
struct Faults {
    commit_conflicts: AtomicU32,
    refund_writes: AtomicBool,
    finalize_writes: AtomicBool,
}

impl Faults {
    fn take_conflict(&self) -> bool {
        self.commit_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Process-local store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    catalog: Arc<Catalog>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    /// Empty store serving the default catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `catalog` instead of the default one
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Store pre-provisioned with users and their opening balances
    pub async fn seeded<I, K>(users: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        let store = Self::new();
        for (id, credits) in users {
            store.insert_user(User::new(id, credits)).await;
        }
        store
    }

    /// Provision a user, replacing any existing one with the same id
    pub async fn insert_user(&self, user: User) {
        info!("Provisioning user {} with {} credits", user.id, user.credits);
        self.state.lock().await.users.insert(user.id.clone(), user);
    }

    /// Import a request as-is, bypassing the ledger
    pub async fn import_generation_request(&self, request: GenerationRequest) {
        self.state.lock().await.requests.insert(request.id, request);
    }

    /// Every stored request, oldest first
    pub async fn generation_requests(&self) -> Vec<GenerationRequest> {
        let state = self.state.lock().await;
        let mut requests: Vec<_> = state.requests.values().cloned().collect();
        requests.sort_by_key(|r| (r.created_at, r.id));
        requests
    }

    /// Fail the next `n` unit commits with a write conflict
    pub fn inject_commit_conflicts(&self, n: u32) {
        self.faults.commit_conflicts.store(n, Ordering::SeqCst);
    }

    /// Make refund transaction writes fail
    pub fn fail_refund_writes(&self, fail: bool) {
        self.faults.refund_writes.store(fail, Ordering::SeqCst);
    }

    /// Make generation request status transitions fail
    pub fn fail_finalize_writes(&self, fail: bool) {
        self.faults.finalize_writes.store(fail, Ordering::SeqCst);
    }

    async fn finalize(
        &self,
        id: Uuid,
        status: GenerationStatus,
        image_url: Option<&str>,
        error: Option<&str>,
    ) -> AppResult<()> {
        if self.faults.finalize_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(format!(
                "Failed to update generation request {}: storage unavailable",
                id
            )));
        }

        let mut state = self.state.lock().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| AppError::GenerationRequestNotFound(id.to_string()))?;

        if !request.status.can_transition_to(status) {
            warn!(
                "Refusing {} -> {} for generation request {}",
                request.status, status, id
            );
            return Err(AppError::Internal(format!(
                "Generation request {} is already {}",
                id, request.status
            )));
        }

        request.status = status;
        request.image_url = image_url.map(str::to_string);
        request.error = error.map(str::to_string);
        request.updated_at = Utc::now();
        Ok(())
    }
}

/// Unit of work over a [`MemoryStore`]
pub struct MemoryUnit {
    state: OwnedMutexGuard<MemoryState>,
    faults: Arc<Faults>,
    credits: HashMap<String, i64>,
    transactions: Vec<LedgerTransaction>,
    requests: Vec<GenerationRequest>,
}

#[async_trait]
impl AtomicStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> AppResult<MemoryUnit> {
        let state = self.state.clone().lock_owned().await;
        Ok(MemoryUnit {
            state,
            faults: self.faults.clone(),
            credits: HashMap::new(),
            transactions: Vec::new(),
            requests: Vec::new(),
        })
    }
}

#[async_trait]
impl LedgerUnit for MemoryUnit {
    async fn load_credits(&mut self, user_id: &str) -> AppResult<Option<i64>> {
        if let Some(staged) = self.credits.get(user_id) {
            return Ok(Some(*staged));
        }
        Ok(self.state.users.get(user_id).map(|u| u.credits))
    }

    async fn store_credits(&mut self, user_id: &str, credits: i64) -> AppResult<()> {
        if !self.state.users.contains_key(user_id) {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        if credits < 0 {
            return Err(AppError::Database(format!(
                "Balance of user {} would become negative",
                user_id
            )));
        }
        self.credits.insert(user_id.to_string(), credits);
        Ok(())
    }

    async fn append_transaction(&mut self, transaction: &LedgerTransaction) -> AppResult<()> {
        if transaction.transaction_type == TransactionType::Refund
            && self.faults.refund_writes.load(Ordering::SeqCst)
        {
            return Err(AppError::Database(
                "Failed to append ledger transaction: storage unavailable".to_string(),
            ));
        }
        self.transactions.push(transaction.clone());
        Ok(())
    }

    async fn insert_generation_request(&mut self, request: &GenerationRequest) -> AppResult<()> {
        if self.state.requests.contains_key(&request.id) {
            return Err(AppError::Database(format!(
                "Generation request {} already exists",
                request.id
            )));
        }
        self.requests.push(request.clone());
        Ok(())
    }

    async fn has_refund(&mut self, request_id: Uuid) -> AppResult<bool> {
        let is_refund = |t: &LedgerTransaction| {
            t.generation_request_id == request_id
                && t.transaction_type == TransactionType::Refund
        };
        Ok(self.state.transactions.iter().any(is_refund) || self.transactions.iter().any(is_refund))
    }

    async fn commit(mut self) -> AppResult<()> {
        if self.faults.take_conflict() {
            debug!("Injected write conflict, discarding staged writes");
            return Err(AppError::WriteConflict(
                "Concurrent update of user balance".to_string(),
            ));
        }

        let now = Utc::now();
        for (user_id, credits) in std::mem::take(&mut self.credits) {
            if let Some(user) = self.state.users.get_mut(&user_id) {
                user.credits = credits;
                user.updated_at = now;
            }
        }
        for request in std::mem::take(&mut self.requests) {
            self.state.requests.insert(request.id, request);
        }
        let transactions = std::mem::take(&mut self.transactions);
        self.state.transactions.extend(transactions);
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn transactions_for_user(&self, user_id: &str) -> AppResult<Vec<LedgerTransaction>> {
        let state = self.state.lock().await;
        let mut history: Vec<_> = state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep newest-first commit order
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(history)
    }
}

#[async_trait]
impl GenerationRequestRepository for MemoryStore {
    async fn find_generation_request(&self, id: Uuid) -> AppResult<Option<GenerationRequest>> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn mark_completed(&self, id: Uuid, image_url: &str) -> AppResult<()> {
        self.finalize(id, GenerationStatus::Completed, Some(image_url), None)
            .await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> AppResult<()> {
        self.finalize(id, GenerationStatus::Failed, None, Some(error))
            .await
    }

    fn requests_in_window(
        &self,
        window: ReportWindow,
    ) -> BoxStream<'_, AppResult<GenerationRequest>> {
        let state = self.state.clone();
        stream::once(async move {
            let state = state.lock().await;
            let mut requests: Vec<_> = state
                .requests
                .values()
                .filter(|r| window.contains(r.created_at))
                .cloned()
                .collect();
            requests.sort_by_key(|r| (r.created_at, r.id));
            requests.into_iter().map(Ok).collect::<Vec<_>>()
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn latest_report(&self) -> AppResult<Option<Report>> {
        let state = self.state.lock().await;
        Ok(state
            .reports
            .values()
            .max_by_key(|r| (r.window_end, r.generated_at))
            .cloned())
    }

    async fn report_before(
        &self,
        window_end: DateTime<Utc>,
        exclude_id: &str,
    ) -> AppResult<Option<Report>> {
        let state = self.state.lock().await;
        Ok(state
            .reports
            .values()
            .filter(|r| r.window_end < window_end && r.id != exclude_id)
            .max_by_key(|r| (r.window_end, r.generated_at))
            .cloned())
    }

    async fn save_report(&self, report: &Report) -> AppResult<()> {
        self.state
            .lock()
            .await
            .reports
            .insert(report.id.clone(), report.clone());
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for MemoryStore {
    async fn load_catalog(&self) -> AppResult<Catalog> {
        Ok(self.catalog.as_ref().clone())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::models::ImageModel;
    use chrono::{Duration, TimeZone};

    fn pending(user: &str, cost: i64) -> GenerationRequest {
        GenerationRequest::pending(
            user,
            ImageModel::ModelA,
            "anime",
            "vibrant",
            "512x512",
            None,
            cost,
        )
    }

    #[tokio::test]
    async fn test_uncommitted_unit_leaves_no_trace() {
        let store = MemoryStore::seeded([("u1", 10)]).await;
        let request = pending("u1", 3);

        let mut unit = store.begin().await.unwrap();
        unit.store_credits("u1", 7).await.unwrap();
        unit.insert_generation_request(&request).await.unwrap();
        unit.append_transaction(&LedgerTransaction::deduction("u1", 3, request.id))
            .await
            .unwrap();
        assert_eq!(unit.load_credits("u1").await.unwrap(), Some(7));
        unit.rollback().await.unwrap();

        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credits, 10);
        assert!(store.transactions_for_user("u1").await.unwrap().is_empty());
        assert!(store.generation_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let store = MemoryStore::seeded([("u1", 10)]).await;
        let request = pending("u1", 3);

        let mut unit = store.begin().await.unwrap();
        unit.store_credits("u1", 7).await.unwrap();
        unit.insert_generation_request(&request).await.unwrap();
        unit.append_transaction(&LedgerTransaction::deduction("u1", 3, request.id))
            .await
            .unwrap();
        unit.commit().await.unwrap();

        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credits, 7);
        assert_eq!(store.transactions_for_user("u1").await.unwrap().len(), 1);
        assert_eq!(
            store.find_generation_request(request.id).await.unwrap().unwrap().status,
            GenerationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_injected_conflict_discards_commit() {
        let store = MemoryStore::seeded([("u1", 10)]).await;
        store.inject_commit_conflicts(1);

        let mut unit = store.begin().await.unwrap();
        unit.store_credits("u1", 1).await.unwrap();
        let err = unit.commit().await.unwrap_err();
        assert!(err.is_write_conflict());
        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credits, 10);

        let mut unit = store.begin().await.unwrap();
        unit.store_credits("u1", 1).await.unwrap();
        unit.commit().await.unwrap();
        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credits, 1);
    }

    #[tokio::test]
    async fn test_terminal_requests_reject_transitions() {
        let store = MemoryStore::new();
        let request = pending("u1", 1);
        store.import_generation_request(request.clone()).await;

        store.mark_completed(request.id, "http://img").await.unwrap();
        let err = store.mark_failed(request.id, "late").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let err = store.mark_failed(Uuid::nil(), "x").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationRequestNotFound(_)));
    }

    #[tokio::test]
    async fn test_window_stream_filters_by_creation_time() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();
        let window = ReportWindow::trailing_week(now);

        for offset_days in [0, 1, 6, 7, 8] {
            let mut request = pending("u1", 1);
            request.created_at = now - Duration::days(offset_days);
            store.import_generation_request(request).await;
        }

        let seen: Vec<_> = store.requests_in_window(window).collect().await;
        // day 0 is the exclusive end, day 7 the inclusive start
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_reports_are_ordered_by_period() {
        let store = MemoryStore::new();
        let now = Utc::now();
        // report_a was generated last but covers the oldest period
        for (id, age, generated_age) in [("report_a", 14, 0), ("report_b", 7, 2), ("report_c", 0, 1)] {
            store
                .save_report(&Report {
                    id: id.to_string(),
                    window_start: now - Duration::days(age + 7),
                    window_end: now - Duration::days(age),
                    total_requests: 0,
                    total_credits_spent: 0,
                    total_credits_refunded: 0,
                    success_rate: 0.0,
                    by_model: Default::default(),
                    by_style: Default::default(),
                    by_size: Default::default(),
                    anomalies: vec![],
                    generated_at: now - Duration::hours(generated_age),
                })
                .await
                .unwrap();
        }

        let latest = store.latest_report().await.unwrap().unwrap();
        assert_eq!(latest.id, "report_c");

        let previous = store.report_before(now, "report_c").await.unwrap().unwrap();
        assert_eq!(previous.id, "report_b");

        let previous = store
            .report_before(now - Duration::days(7), "report_x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previous.id, "report_a");

        // same period end is not earlier
        let none = store
            .report_before(now - Duration::days(14), "report_x")
            .await
            .unwrap();
        assert!(none.is_none());

        // a rerun with a later end still skips its own id
        let previous = store
            .report_before(now + Duration::hours(2), "report_c")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previous.id, "report_b");
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let store = MemoryStore::seeded([("u1", 10)]).await;
        let request = pending("u1", 2);

        let mut unit = store.begin().await.unwrap();
        unit.append_transaction(&LedgerTransaction::deduction("u1", 2, request.id))
            .await
            .unwrap();
        unit.append_transaction(&LedgerTransaction::refund("u1", 2, request.id))
            .await
            .unwrap();
        unit.commit().await.unwrap();

        let history = store.transactions_for_user("u1").await.unwrap();
        assert_eq!(history[0].transaction_type, TransactionType::Refund);
        assert_eq!(history[1].transaction_type, TransactionType::Deduction);
    }
}
