//! User model
//!
//! A credit-holding user. Users are provisioned externally; the balance is
//! only ever mutated through the credit ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Caller-supplied identifier (trusted, not authenticated)
    pub id: String,

    /// Current credit balance, never negative
    pub credits: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last balance change
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with an opening balance
    pub fn new(id: impl Into<String>, credits: i64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            credits: credits.max(0),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the balance covers `amount`
    #[inline]
    pub fn can_afford(&self, amount: i64) -> bool {
        self.credits >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_clamps_negative_balance() {
        let user = User::new("u1", -5);
        assert_eq!(user.credits, 0);
    }

    #[test]
    fn test_can_afford() {
        let user = User::new("u1", 3);
        assert!(user.can_afford(3));
        assert!(!user.can_afford(4));
    }
}
