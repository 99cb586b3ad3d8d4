//! game_ledger Library
//!
//! Multi-currency in-game economy ledger on PostgreSQL. Platform adapters
//! talk to the [`Economy`] contract; everything behind it is transactional
//! database state with per-row locking.

pub mod config;
pub mod currency;
pub mod db;
pub mod domain;
pub mod economy;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod store;

pub use config::{Config, ConfigError, DatabaseConfig, LogFormat};
pub use currency::{Currency, CurrencyFile, CurrencyRegistry, OverdraftPolicy};
pub use db::{Database, Migrator, RetryPolicy};
pub use domain::{Account, Amount, AmountError, Balance, DomainError, OperationContext};
pub use economy::{amount_from_f64, Economy};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{LedgerService, TransferOutcome};
