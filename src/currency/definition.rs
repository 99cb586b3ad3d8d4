//! Currency definitions file
//!
//! ```json
//! {
//!   "default_currency": "dollar",
//!   "currencies": [
//!     { "id": "dollar", "name_singular": "Dollar", "name_plural": "Dollars",
//!       "symbol": "$", "fractional_digits": 2, "starting_balance": "100.00" }
//!   ]
//! }
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Currency, OverdraftPolicy};
use crate::config::ConfigError;
use crate::domain::{to_minor_units, MAX_FRACTIONAL_DIGITS};

/// One currency as written by the server operator, in display units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDefinition {
    pub id: String,
    pub name_singular: String,
    pub name_plural: String,
    pub symbol: String,
    pub fractional_digits: u32,
    #[serde(default)]
    pub starting_balance: Decimal,
    /// Enables overdraft down to this non-positive balance
    #[serde(default)]
    pub overdraft_floor: Option<Decimal>,
}

/// The whole definitions document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyFile {
    pub default_currency: String,
    pub currencies: Vec<CurrencyDefinition>,
}

impl CurrencyFile {
    /// Read and parse a definitions file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::CurrencyFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&raw).map_err(|e| ConfigError::CurrencyFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse definitions from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidCurrencies(e.to_string()))
    }

    /// Convert to currencies, moving display-unit values into minor units
    pub fn to_currencies(&self) -> Result<Vec<Currency>, ConfigError> {
        self.currencies
            .iter()
            .map(|def| def.to_currency(def.id == self.default_currency))
            .collect()
    }
}

impl CurrencyDefinition {
    fn to_currency(&self, is_default: bool) -> Result<Currency, ConfigError> {
        let invalid = |what: String| ConfigError::InvalidCurrencies(format!("{}: {}", self.id, what));

        if self.fractional_digits > MAX_FRACTIONAL_DIGITS {
            return Err(invalid(format!(
                "fractional_digits must be at most {}",
                MAX_FRACTIONAL_DIGITS
            )));
        }

        let starting_balance = to_minor_units(self.starting_balance, self.fractional_digits)
            .map_err(|e| invalid(format!("starting_balance: {}", e)))?;

        let overdraft = match self.overdraft_floor {
            None => OverdraftPolicy::Disabled,
            Some(floor) => OverdraftPolicy::Floor(
                to_minor_units(floor, self.fractional_digits)
                    .map_err(|e| invalid(format!("overdraft_floor: {}", e)))?,
            ),
        };

        Ok(Currency {
            id: self.id.clone(),
            name_singular: self.name_singular.clone(),
            name_plural: self.name_plural.clone(),
            symbol: self.symbol.clone(),
            fractional_digits: self.fractional_digits,
            is_default,
            starting_balance,
            overdraft,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        "default_currency": "dollar",
        "currencies": [
            {
                "id": "dollar",
                "name_singular": "Dollar",
                "name_plural": "Dollars",
                "symbol": "$",
                "fractional_digits": 2,
                "starting_balance": "100.00"
            },
            {
                "id": "gem",
                "name_singular": "Gem",
                "name_plural": "Gems",
                "symbol": "G",
                "fractional_digits": 0,
                "overdraft_floor": "-10"
            }
        ]
    }
    "#;

    #[test]
    fn test_parse_and_convert() {
        let file = CurrencyFile::from_json(SAMPLE).unwrap();
        let currencies = file.to_currencies().unwrap();

        assert_eq!(currencies.len(), 2);

        let dollar = &currencies[0];
        assert!(dollar.is_default);
        assert_eq!(dollar.starting_balance, 10_000);
        assert_eq!(dollar.overdraft, OverdraftPolicy::Disabled);

        let gem = &currencies[1];
        assert!(!gem.is_default);
        assert_eq!(gem.starting_balance, 0);
        assert_eq!(gem.overdraft, OverdraftPolicy::Floor(-10));
    }

    #[test]
    fn test_starting_balance_precision_checked() {
        let mut file = CurrencyFile::from_json(SAMPLE).unwrap();
        file.currencies[1].starting_balance = Decimal::new(15, 1);

        let err = file.to_currencies().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCurrencies(msg) if msg.starts_with("gem")));
    }

    #[test]
    fn test_too_many_fractional_digits() {
        let mut file = CurrencyFile::from_json(SAMPLE).unwrap();
        file.currencies[0].fractional_digits = 9;
        assert!(file.to_currencies().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            CurrencyFile::from_json("{ not json"),
            Err(ConfigError::InvalidCurrencies(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = CurrencyFile::from_file(Path::new("/nonexistent/currencies.json")).unwrap_err();
        assert!(matches!(err, ConfigError::CurrencyFile { .. }));
    }
}
