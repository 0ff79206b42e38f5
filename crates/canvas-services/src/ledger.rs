//! Credit ledger
//!
//! Owns every mutation of a user's balance. Each mutation runs as one atomic
//! unit that reads the balance, checks it, writes it back and appends the
//! matching ledger transaction.

use canvas_core::{
    models::{GenerationRequest, LedgerTransaction},
    traits::{LedgerStore, LedgerUnit, TransactionRepository, UserRepository},
    AppError, AppResult,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::atomic::{with_atomic_unit, AtomicOperation, RetryPolicy};

/// Charge a pending request and create it, in one unit
struct DeductCredits<'a> {
    request: &'a GenerationRequest,
}

#[async_trait]
impl<U: LedgerUnit> AtomicOperation<U> for DeductCredits<'_> {
    type Output = i64;

    async fn run(&self, unit: &mut U) -> AppResult<i64> {
        let request = self.request;

        let balance = unit
            .load_credits(&request.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(request.user_id.clone()))?;

        if balance < request.cost {
            return Err(AppError::InsufficientCredits {
                required: request.cost,
                available: balance,
            });
        }

        let remaining = balance - request.cost;
        unit.store_credits(&request.user_id, remaining).await?;
        unit.insert_generation_request(request).await?;
        unit.append_transaction(&LedgerTransaction::deduction(
            request.user_id.clone(),
            request.cost,
            request.id,
        ))
        .await?;

        Ok(remaining)
    }
}

/// Return credits for a request, at most once
struct RefundCredits<'a> {
    user_id: &'a str,
    amount: i64,
    request_id: Uuid,
}

#[async_trait]
impl<U: LedgerUnit> AtomicOperation<U> for RefundCredits<'_> {
    type Output = RefundOutcome;

    async fn run(&self, unit: &mut U) -> AppResult<RefundOutcome> {
        let balance = unit
            .load_credits(self.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(self.user_id.to_string()))?;

        if unit.has_refund(self.request_id).await? {
            return Ok(RefundOutcome::AlreadyRefunded);
        }

        let restored = balance.checked_add(self.amount).ok_or_else(|| {
            AppError::Internal(format!("Balance overflow refunding user {}", self.user_id))
        })?;

        unit.store_credits(self.user_id, restored).await?;
        unit.append_transaction(&LedgerTransaction::refund(
            self.user_id,
            self.amount,
            self.request_id,
        ))
        .await?;

        Ok(RefundOutcome::Refunded { balance: restored })
    }
}

/// Result of a refund attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// Credits returned; `balance` is the new balance
    Refunded { balance: i64 },
    /// A refund for this request was already recorded, nothing changed
    AlreadyRefunded,
}

/// Balance and ledger history of one user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditHistory {
    pub current_credits: i64,
    /// Newest first
    pub transactions: Vec<LedgerTransaction>,
}

/// Credit ledger over a store
pub struct CreditLedger<S: LedgerStore> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: LedgerStore> CreditLedger<S> {
    /// Create a new ledger
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    fn ensure_positive(amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::Validation(format!(
                "Credit amount must be positive, got {}",
                amount
            )));
        }
        Ok(())
    }

    /// Charge `request.cost` to `request.user_id` and persist the pending request
    ///
    /// The balance update, the deduction transaction and the request document
    /// commit together or not at all.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user does not exist
    /// - `InsufficientCredits` if the balance is below the cost
    #[instrument(skip(self, request), fields(user_id = %request.user_id, request_id = %request.id, cost = request.cost))]
    pub async fn deduct(&self, request: GenerationRequest) -> AppResult<GenerationRequest> {
        Self::ensure_positive(request.cost)?;

        match with_atomic_unit(
            self.store.as_ref(),
            self.retry,
            &DeductCredits { request: &request },
        )
        .await
        {
            Ok(remaining) => {
                info!(remaining, "Deducted {} credits", request.cost);
                Ok(request)
            }
            Err(e) => {
                if e.is_rejection() {
                    warn!("Deduction rejected: {}", e);
                }
                Err(e)
            }
        }
    }

    /// Return `amount` credits to `user_id` for `request_id`
    ///
    /// A second refund for the same request changes nothing and reports
    /// `AlreadyRefunded`. No upper bound is enforced on the resulting balance.
    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        user_id: &str,
        amount: i64,
        request_id: Uuid,
    ) -> AppResult<RefundOutcome> {
        Self::ensure_positive(amount)?;

        let outcome = with_atomic_unit(
            self.store.as_ref(),
            self.retry,
            &RefundCredits {
                user_id,
                amount,
                request_id,
            },
        )
        .await?;

        match outcome {
            RefundOutcome::Refunded { balance } => {
                info!(balance, "Refunded {} credits", amount)
            }
            RefundOutcome::AlreadyRefunded => {
                warn!("Refund already recorded, skipping")
            }
        }

        Ok(outcome)
    }

    /// Current balance and ledger history, newest first
    #[instrument(skip(self))]
    pub async fn history(&self, user_id: &str) -> AppResult<CreditHistory> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        let transactions = self.store.transactions_for_user(user_id).await?;

        Ok(CreditHistory {
            current_credits: user.credits,
            transactions,
        })
    }
}
