//! Credit balance DTOs

use canvas_core::models::{LedgerTransaction, TransactionType};
use canvas_services::CreditHistory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query for `GET /credits`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditsQuery {
    /// User to look up
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// One ledger movement
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    /// Transaction identifier
    pub id: Uuid,
    /// `deduction` or `refund`
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Credits moved
    pub credits: i64,
    /// Request the movement accounts for
    pub generation_request_id: Uuid,
    /// Commit time
    pub timestamp: DateTime<Utc>,
}

impl From<LedgerTransaction> for TransactionResponse {
    fn from(t: LedgerTransaction) -> Self {
        Self {
            id: t.id,
            transaction_type: t.transaction_type,
            credits: t.credits,
            generation_request_id: t.generation_request_id,
            timestamp: t.timestamp,
        }
    }
}

/// Balance with transaction history, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    /// Current balance
    pub current_credits: i64,
    /// Ledger movements
    pub transactions: Vec<TransactionResponse>,
}

impl From<CreditHistory> for CreditsResponse {
    fn from(history: CreditHistory) -> Self {
        Self {
            current_credits: history.current_credits,
            transactions: history.transactions.into_iter().map(Into::into).collect(),
        }
    }
}
