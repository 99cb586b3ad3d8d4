//! Error handling module
//!
//! Centralized error type separating expected business outcomes from
//! infrastructure failures.

use crate::config::ConfigError;
use crate::db::MigrationError;
use crate::domain::{AmountError, DomainError};

/// Ledger-wide Result type
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger error types
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    // Expected outcomes
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Infrastructure failures
    #[error("No database connection available within the acquisition timeout")]
    PoolExhausted,

    #[error("Persistence error: {0}")]
    Persistence(sqlx::Error),

    // Startup failures
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => LedgerError::PoolExhausted,
            other => LedgerError::Persistence(other),
        }
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        LedgerError::Domain(DomainError::InvalidAmount(err))
    }
}

impl LedgerError {
    /// Expected outcome the caller turns into a player-facing message
    pub fn is_business_outcome(&self) -> bool {
        matches!(self, LedgerError::Domain(_))
    }

    /// Transient infrastructure failure; only read-only calls retry on these
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::PoolExhausted => true,
            LedgerError::Persistence(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    /// The wrapped business outcome, if any
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            LedgerError::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Log infrastructure failures for operators; business outcomes stay quiet.
    pub(crate) fn log(&self, operation: &'static str) {
        match self {
            LedgerError::Domain(e) => {
                tracing::debug!(operation, outcome = e.code(), "Ledger call rejected");
            }
            LedgerError::PoolExhausted => {
                tracing::warn!(operation, "Connection pool exhausted");
            }
            LedgerError::Persistence(e) => {
                tracing::error!(operation, error = ?e, "Database error");
            }
            LedgerError::Migration(e) => {
                tracing::error!(operation, error = %e, "Migration error");
            }
            LedgerError::Config(e) => {
                tracing::error!(operation, error = %e, "Config error");
            }
        }
    }
}
