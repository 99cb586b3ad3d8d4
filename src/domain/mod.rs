//! Domain module
//!
//! Core domain types and business rules of the economy.

pub mod account;
pub mod amount;
pub mod context;
pub mod entry;
pub mod error;

pub use account::{Account, Balance};
pub use amount::{
    decimal_from_f64, from_minor_units, non_negative_minor_units, to_minor_units, Amount,
    AmountError, MAX_FRACTIONAL_DIGITS,
};
pub use context::OperationContext;
pub use entry::{EntryCause, EntryFilter, LedgerEntry, NewEntry};
pub use error::DomainError;
