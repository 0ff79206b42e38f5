//! Ledger transaction model
//!
//! Immutable, append-only record of every credit-affecting event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits charged for a generation request
    Deduction,
    /// Credits returned after a failed generation
    Refund,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Deduction => write!(f, "deduction"),
            TransactionType::Refund => write!(f, "refund"),
        }
    }
}

impl TransactionType {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deduction" => Some(TransactionType::Deduction),
            "refund" => Some(TransactionType::Refund),
            _ => None,
        }
    }

    /// Signed effect of this transaction type on a balance
    pub fn signed(&self, credits: i64) -> i64 {
        match self {
            TransactionType::Deduction => -credits,
            TransactionType::Refund => credits,
        }
    }
}

/// Ledger transaction entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    /// Unique identifier
    pub id: Uuid,

    /// User whose balance changed
    pub user_id: String,

    /// Kind of movement
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// Credits moved, always positive
    pub credits: i64,

    /// Generation request this movement accounts for
    pub generation_request_id: Uuid,

    /// When the movement was committed
    pub timestamp: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Create a deduction record
    pub fn deduction(user_id: impl Into<String>, credits: i64, generation_request_id: Uuid) -> Self {
        Self::new(user_id, TransactionType::Deduction, credits, generation_request_id)
    }

    /// Create a refund record
    pub fn refund(user_id: impl Into<String>, credits: i64, generation_request_id: Uuid) -> Self {
        Self::new(user_id, TransactionType::Refund, credits, generation_request_id)
    }

    fn new(
        user_id: impl Into<String>,
        transaction_type: TransactionType,
        credits: i64,
        generation_request_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            transaction_type,
            credits,
            generation_request_id,
            timestamp: Utc::now(),
        }
    }
}
