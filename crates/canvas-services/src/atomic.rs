//! Atomic unit runner
//!
//! Runs an [`AtomicOperation`] inside one store unit, committing on success
//! and retrying the whole unit when a concurrent writer caused a conflict.

use canvas_core::{
    config::GenerationConfig,
    traits::{AtomicStore, LedgerUnit},
    AppError, AppResult,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::constants::{ATOMIC_RETRY_ATTEMPTS, ATOMIC_RETRY_BACKOFF_MS};

/// Work executed against an open unit
///
/// `run` may be invoked several times; every invocation starts from a fresh
/// unit, so it must not keep state between attempts.
#[async_trait]
pub trait AtomicOperation<U: LedgerUnit>: Send + Sync {
    type Output: Send;

    async fn run(&self, unit: &mut U) -> AppResult<Self::Output>;
}

/// Conflict retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: ATOMIC_RETRY_ATTEMPTS,
            backoff: Duration::from_millis(ATOMIC_RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            attempts: config.atomic_retry_attempts.max(1),
            backoff: Duration::from_millis(config.atomic_retry_backoff_ms),
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Run `operation` as one all-or-nothing unit
///
/// Errors other than write conflicts roll the unit back and are returned
/// unchanged. Conflicts are retried; once attempts are exhausted they
/// surface as `AppError::Internal`.
pub async fn with_atomic_unit<S, O>(
    store: &S,
    policy: RetryPolicy,
    operation: &O,
) -> AppResult<O::Output>
where
    S: AtomicStore + ?Sized,
    O: AtomicOperation<S::Unit>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let mut unit = store.begin().await?;
        let result = match operation.run(&mut unit).await {
            Ok(output) => unit.commit().await.map(|_| output),
            Err(e) => {
                if let Err(rollback_err) = unit.rollback().await {
                    warn!("Rollback after failed unit also failed: {}", rollback_err);
                }
                Err(e)
            }
        };

        match result {
            Ok(output) => {
                if attempt > 1 {
                    debug!(attempt, "Atomic unit committed after retry");
                }
                return Ok(output);
            }
            Err(e) if e.is_write_conflict() && attempt < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(attempt, ?delay, "Write conflict, retrying unit: {}", e);
                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_write_conflict() => {
                error!(attempts, "Write conflicts exhausted retries: {}", e);
                return Err(AppError::Internal(format!(
                    "Atomic unit abandoned after {} conflicting attempts: {}",
                    attempts, e
                )));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_db::{MemoryStore, MemoryUnit};
    use canvas_core::traits::UserRepository;

    struct SetBalance(i64);

    #[async_trait]
    impl AtomicOperation<MemoryUnit> for SetBalance {
        type Output = i64;

        async fn run(&self, unit: &mut MemoryUnit) -> AppResult<i64> {
            let before = unit.load_credits("u1").await?.unwrap_or_default();
            unit.store_credits("u1", self.0).await?;
            Ok(before)
        }
    }

    struct AlwaysRejects;

    #[async_trait]
    impl AtomicOperation<MemoryUnit> for AlwaysRejects {
        type Output = ();

        async fn run(&self, unit: &mut MemoryUnit) -> AppResult<()> {
            unit.store_credits("u1", 0).await?;
            Err(AppError::Validation("rejected".to_string()))
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_until_commit() {
        let store = MemoryStore::seeded([("u1", 10)]).await;
        store.inject_commit_conflicts(2);

        let before = with_atomic_unit(&store, fast_policy(3), &SetBalance(4))
            .await
            .unwrap();

        assert_eq!(before, 10);
        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credits, 4);
    }

    #[tokio::test]
    async fn test_exhausted_conflicts_become_internal() {
        let store = MemoryStore::seeded([("u1", 10)]).await;
        store.inject_commit_conflicts(3);

        let err = with_atomic_unit(&store, fast_policy(3), &SetBalance(4))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credits, 10);
    }

    #[tokio::test]
    async fn test_operation_error_rolls_back_without_retry() {
        let store = MemoryStore::seeded([("u1", 10)]).await;
        store.inject_commit_conflicts(1);

        let err = with_atomic_unit(&store, fast_policy(3), &AlwaysRejects)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credits, 10);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&GenerationConfig {
            atomic_retry_attempts: 0,
            atomic_retry_backoff_ms: 10,
            ..Default::default()
        });
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.delay_after(3), Duration::from_millis(30));
    }
}
