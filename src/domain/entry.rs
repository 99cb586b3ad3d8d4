//! Ledger entry models
//!
//! One entry per balance mutation. Entries are append-only facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCause {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
    /// Administrative override, bypasses sufficiency checks
    SetBalance,
    /// Seeded when an account is first created
    StartingBalance,
}

impl EntryCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCause::Deposit => "deposit",
            EntryCause::Withdraw => "withdraw",
            EntryCause::TransferOut => "transfer_out",
            EntryCause::TransferIn => "transfer_in",
            EntryCause::SetBalance => "set_balance",
            EntryCause::StartingBalance => "starting_balance",
        }
    }
}

impl std::fmt::Display for EntryCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unrecognised cause tag read back from storage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown entry cause: {0}")]
pub struct UnknownCause(pub String);

impl std::str::FromStr for EntryCause {
    type Err = UnknownCause;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(EntryCause::Deposit),
            "withdraw" => Ok(EntryCause::Withdraw),
            "transfer_out" => Ok(EntryCause::TransferOut),
            "transfer_in" => Ok(EntryCause::TransferIn),
            "set_balance" => Ok(EntryCause::SetBalance),
            "starting_balance" => Ok(EntryCause::StartingBalance),
            other => Err(UnknownCause(other.to_string())),
        }
    }
}

/// A persisted ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub currency_id: String,
    /// Signed change in minor units
    pub delta: i64,
    pub resulting_balance: i64,
    pub cause: EntryCause,
    pub correlation_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An entry about to be appended inside a ledger transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub account_id: Uuid,
    pub currency_id: String,
    pub delta: i64,
    pub resulting_balance: i64,
    pub cause: EntryCause,
    pub correlation_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// Default page size when reading entries back
pub const DEFAULT_ENTRY_LIMIT: i64 = 100;

/// Filter for reading entries back, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    pub currency_id: Option<String>,
    pub cause: Option<EntryCause>,
    pub since: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            currency_id: None,
            cause: None,
            since: None,
            limit: DEFAULT_ENTRY_LIMIT,
        }
    }
}

impl EntryFilter {
    pub fn currency(mut self, currency_id: impl Into<String>) -> Self {
        self.currency_id = Some(currency_id.into());
        self
    }

    pub fn cause(mut self, cause: EntryCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Row limit actually sent to the database, at least one
    pub fn effective_limit(&self) -> i64 {
        self.limit.max(1)
    }
}
