//! Currency model

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::{from_minor_units, to_minor_units, AmountError};

/// Whether balances of a currency may drop below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "floor", rename_all = "snake_case")]
pub enum OverdraftPolicy {
    /// Balances never go below zero
    #[default]
    Disabled,
    /// Balances may go down to this non-positive floor, in minor units
    Floor(i64),
}

/// A unit of value in the economy. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Stable identifier, e.g. `"dollar"`
    pub id: String,
    pub name_singular: String,
    pub name_plural: String,
    pub symbol: String,
    /// Decimal places of the display unit; minor units are scaled by `10^digits`
    pub fractional_digits: u32,
    pub is_default: bool,
    /// Balance seeded into newly created accounts, in minor units
    pub starting_balance: i64,
    pub overdraft: OverdraftPolicy,
}

impl Currency {
    /// Lowest balance a withdrawal or transfer may leave behind, in minor units
    pub fn floor(&self) -> i64 {
        match self.overdraft {
            OverdraftPolicy::Disabled => 0,
            OverdraftPolicy::Floor(floor) => floor,
        }
    }

    /// Display-unit decimal to minor units, rejecting excess precision
    pub fn to_minor(&self, amount: Decimal) -> Result<i64, AmountError> {
        to_minor_units(amount, self.fractional_digits)
    }

    /// Minor units to a display-unit decimal at this currency's scale
    pub fn to_display(&self, minor: i64) -> Decimal {
        from_minor_units(minor, self.fractional_digits)
    }

    /// Singular name for exactly one unit, plural otherwise
    pub fn name_for(&self, amount: Decimal) -> &str {
        if amount == Decimal::ONE {
            &self.name_singular
        } else {
            &self.name_plural
        }
    }

    /// Symbol followed by the amount truncated (never rounded up) to the
    /// currency's fractional digits, e.g. `$10.50`.
    pub fn format(&self, amount: Decimal) -> String {
        let mut truncated =
            amount.round_dp_with_strategy(self.fractional_digits, RoundingStrategy::ToZero);
        truncated.rescale(self.fractional_digits);
        format!("{}{}", self.symbol, truncated)
    }

    /// [`Currency::format`] for a stored minor-unit balance
    pub fn format_minor(&self, minor: i64) -> String {
        self.format(self.to_display(minor))
    }
}
