//! Domain Error Types
//!
//! Expected business outcomes of ledger operations.

use thiserror::Error;
use uuid::Uuid;

use super::AmountError;

/// Business-rule outcomes of a ledger call.
///
/// These are ordinary results for the caller to turn into a player-facing
/// message. They are not infrastructure failures and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Amount is zero, negative, non-finite or too precise for the currency
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// The operation would push the balance below its floor
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Transfer source and destination are the same account
    #[error("Cannot transfer to the same account")]
    SameAccount,

    /// Currency id is not in the registry
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Operation requires an existing account
    #[error("Unknown account: {0}")]
    UnknownAccount(Uuid),
}

impl DomainError {
    /// Create an insufficient funds error from minor-unit values
    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Stable machine-readable code for adapters to key messages on
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::SameAccount => "same_account",
            Self::UnknownCurrency(_) => "unknown_currency",
            Self::UnknownAccount(_) => "unknown_account",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(5000, 4000);

        assert_eq!(err.code(), "insufficient_funds");
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("4000"));
    }

    #[test]
    fn test_invalid_amount_from_amount_error() {
        let err: DomainError = AmountError::NotPositive(Decimal::ZERO).into();
        assert_eq!(err.code(), "invalid_amount");
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_unknown_account_mentions_id() {
        let id = Uuid::new_v4();
        let err = DomainError::UnknownAccount(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
