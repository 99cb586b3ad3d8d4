//! Account and balance models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Economic identity of a single player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable player identifier
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Quantity of one currency owned by one account, in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: Uuid,
    pub currency_id: String,
    pub amount: i64,
}

impl Balance {
    /// A balance that has not been materialized yet reads as zero
    pub fn zero(account_id: Uuid, currency_id: impl Into<String>) -> Self {
        Self {
            account_id,
            currency_id: currency_id.into(),
            amount: 0,
        }
    }
}
