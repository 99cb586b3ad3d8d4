//! Amount type
//!
//! Domain primitive for amounts crossing the economy boundary, plus the
//! conversions between display units (human decimals such as `10.50`) and
//! the minor units (integer cents) balances are stored in.
//!
//! All arithmetic on balances happens on `i64` minor units. Decimals only
//! exist at the edge, which keeps repeated small deposits free of rounding
//! drift.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum fractional digits a currency may declare.
pub const MAX_FRACTIONAL_DIGITS: u32 = 8;

/// Amount represents a validated, strictly positive display-unit value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - At most [`MAX_FRACTIONAL_DIGITS`] decimal places
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use game_ledger::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(1050, 2)).unwrap();
/// assert_eq!(amount.to_minor_units(2).unwrap(), 1050);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

/// Errors that can occur when creating or converting an amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {max}, got {got})")]
    TooManyDecimals { max: u32, got: u32 },

    #[error("Amount is not a finite number")]
    NotFinite,

    #[error("Amount exceeds the representable range")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 8 decimal places
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        let scale = value.normalize().scale();
        if scale > MAX_FRACTIONAL_DIGITS {
            return Err(AmountError::TooManyDecimals {
                max: MAX_FRACTIONAL_DIGITS,
                got: scale,
            });
        }

        Ok(Self(value))
    }

    /// Create an Amount from a float handed over by a legacy provider.
    ///
    /// Non-finite values are rejected. Finite values are rounded half away
    /// from zero to `fractional_digits`, since binary floats rarely hold the
    /// exact decimal the caller meant.
    pub fn from_f64(value: f64, fractional_digits: u32) -> Result<Self, AmountError> {
        Self::new(decimal_from_f64(value, fractional_digits)?)
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Convert to minor units of a currency with `fractional_digits` digits.
    pub fn to_minor_units(&self, fractional_digits: u32) -> Result<i64, AmountError> {
        to_minor_units(self.0, fractional_digits)
    }
}

/// Convert a display-unit decimal to minor units.
///
/// Rejects values carrying more precision than the currency allows instead
/// of rounding them away.
pub fn to_minor_units(value: Decimal, fractional_digits: u32) -> Result<i64, AmountError> {
    let got = value.normalize().scale();
    if got > fractional_digits {
        return Err(AmountError::TooManyDecimals {
            max: fractional_digits,
            got,
        });
    }

    let factor = Decimal::from(10_i64.pow(fractional_digits));
    value
        .checked_mul(factor)
        .and_then(|scaled| scaled.to_i64())
        .ok_or(AmountError::Overflow)
}

/// Convert a float to a decimal rounded half away from zero to
/// `fractional_digits`. Sign is preserved; non-finite values are rejected.
pub fn decimal_from_f64(value: f64, fractional_digits: u32) -> Result<Decimal, AmountError> {
    if !value.is_finite() {
        return Err(AmountError::NotFinite);
    }

    let decimal = Decimal::from_f64(value).ok_or(AmountError::Overflow)?;
    Ok(decimal.round_dp_with_strategy(fractional_digits, RoundingStrategy::MidpointAwayFromZero))
}

/// Convert minor units back to a display-unit decimal with exactly
/// `fractional_digits` decimal places (`1050` at 2 digits is `10.50`).
pub fn from_minor_units(minor: i64, fractional_digits: u32) -> Decimal {
    Decimal::new(minor, fractional_digits)
}

/// Validate a non-negative display amount and convert it to minor units.
/// Used by administrative overrides where zero is allowed.
pub fn non_negative_minor_units(value: Decimal, fractional_digits: u32) -> Result<i64, AmountError> {
    if value < Decimal::ZERO {
        return Err(AmountError::Negative(value));
    }
    to_minor_units(value, fractional_digits)
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}
