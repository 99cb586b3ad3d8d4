//! Currency module
//!
//! Currency definitions, their persistence, and the read-only registry the
//! ledger resolves currency ids against.

mod definition;
mod model;
mod registry;

pub use definition::{CurrencyDefinition, CurrencyFile};
pub use model::{Currency, OverdraftPolicy};
pub use registry::CurrencyRegistry;
