//! Currency Registry
//!
//! Immutable snapshot of the currencies known to the economy, resolved once
//! at startup and shared behind an `Arc`.

use std::collections::HashMap;

use sqlx::PgPool;

use super::{Currency, CurrencyFile, OverdraftPolicy};
use crate::config::ConfigError;
use crate::domain::{DomainError, MAX_FRACTIONAL_DIGITS};
use crate::error::LedgerResult;

/// Validated set of currencies with exactly one default
#[derive(Debug, Clone)]
pub struct CurrencyRegistry {
    currencies: Vec<Currency>,
    by_id: HashMap<String, usize>,
    default_index: usize,
}

#[derive(sqlx::FromRow)]
struct CurrencyRow {
    id: String,
    name_singular: String,
    name_plural: String,
    symbol: String,
    fractional_digits: i16,
    is_default: bool,
    starting_balance: i64,
    allow_overdraft: bool,
    overdraft_floor: i64,
}

impl TryFrom<CurrencyRow> for Currency {
    type Error = ConfigError;

    fn try_from(row: CurrencyRow) -> Result<Self, Self::Error> {
        let fractional_digits = u32::try_from(row.fractional_digits).map_err(|_| {
            ConfigError::InvalidCurrencies(format!("{}: negative fractional_digits", row.id))
        })?;

        Ok(Currency {
            id: row.id,
            name_singular: row.name_singular,
            name_plural: row.name_plural,
            symbol: row.symbol,
            fractional_digits,
            is_default: row.is_default,
            starting_balance: row.starting_balance,
            overdraft: if row.allow_overdraft {
                OverdraftPolicy::Floor(row.overdraft_floor)
            } else {
                OverdraftPolicy::Disabled
            },
        })
    }
}

impl CurrencyRegistry {
    /// Build a registry, enforcing the registry invariants
    pub fn from_currencies(currencies: Vec<Currency>) -> Result<Self, ConfigError> {
        if currencies.is_empty() {
            return Err(ConfigError::InvalidCurrencies(
                "at least one currency is required".to_string(),
            ));
        }

        let mut by_id = HashMap::with_capacity(currencies.len());
        let mut default_index = None;

        for (index, currency) in currencies.iter().enumerate() {
            let invalid =
                |what: &str| ConfigError::InvalidCurrencies(format!("{}: {}", currency.id, what));

            if currency.id.trim().is_empty() {
                return Err(ConfigError::InvalidCurrencies(
                    "currency id must not be empty".to_string(),
                ));
            }
            if currency.fractional_digits > MAX_FRACTIONAL_DIGITS {
                return Err(invalid("too many fractional digits"));
            }
            if currency.starting_balance < 0 {
                return Err(invalid("starting_balance must not be negative"));
            }
            if currency.floor() > 0 {
                return Err(invalid("overdraft floor must not be positive"));
            }
            if by_id.insert(currency.id.clone(), index).is_some() {
                return Err(invalid("duplicate currency id"));
            }
            if currency.is_default {
                if default_index.is_some() {
                    return Err(invalid("more than one default currency"));
                }
                default_index = Some(index);
            }
        }

        let default_index = default_index.ok_or_else(|| {
            ConfigError::InvalidCurrencies("exactly one default currency is required".to_string())
        })?;

        Ok(Self {
            currencies,
            by_id,
            default_index,
        })
    }

    /// Persist the configured definitions, then load the full persisted set.
    ///
    /// Existing currencies are updated in place; the default flag moves in
    /// the same transaction. Changing the fractional digits of a currency
    /// that already exists is refused, since stored balances are scaled by it.
    pub async fn sync(pool: &PgPool, file: &CurrencyFile) -> LedgerResult<Self> {
        let configured = Self::from_currencies(file.to_currencies()?)?;
        let default_id = &configured.default_currency().id;

        let mut tx = pool.begin().await?;

        for currency in configured.list() {
            let persisted_digits: Option<i16> = sqlx::query_scalar(
                "SELECT fractional_digits FROM currencies WHERE id = $1 FOR UPDATE",
            )
            .bind(&currency.id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(digits) = persisted_digits {
                if i64::from(digits) != i64::from(currency.fractional_digits) {
                    return Err(ConfigError::InvalidCurrencies(format!(
                        "{}: fractional_digits cannot change from {} to {}",
                        currency.id, digits, currency.fractional_digits
                    ))
                    .into());
                }
            }
        }

        sqlx::query("UPDATE currencies SET is_default = FALSE WHERE is_default AND id <> $1")
            .bind(default_id)
            .execute(&mut *tx)
            .await?;

        for currency in configured.list() {
            let (allow_overdraft, overdraft_floor) = match currency.overdraft {
                OverdraftPolicy::Disabled => (false, 0),
                OverdraftPolicy::Floor(floor) => (true, floor),
            };

            sqlx::query(
                r#"
                INSERT INTO currencies (
                    id, name_singular, name_plural, symbol, fractional_digits,
                    is_default, starting_balance, allow_overdraft, overdraft_floor
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE SET
                    name_singular = EXCLUDED.name_singular,
                    name_plural = EXCLUDED.name_plural,
                    symbol = EXCLUDED.symbol,
                    is_default = EXCLUDED.is_default,
                    starting_balance = EXCLUDED.starting_balance,
                    allow_overdraft = EXCLUDED.allow_overdraft,
                    overdraft_floor = EXCLUDED.overdraft_floor
                "#,
            )
            .bind(&currency.id)
            .bind(&currency.name_singular)
            .bind(&currency.name_plural)
            .bind(&currency.symbol)
            .bind(currency.fractional_digits as i16)
            .bind(currency.is_default)
            .bind(currency.starting_balance)
            .bind(allow_overdraft)
            .bind(overdraft_floor)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            configured = configured.len(),
            default = %default_id,
            "Currency definitions synchronised"
        );

        Self::load(pool).await
    }

    /// Load every persisted currency
    pub async fn load(pool: &PgPool) -> LedgerResult<Self> {
        let rows: Vec<CurrencyRow> = sqlx::query_as(
            r#"
            SELECT id, name_singular, name_plural, symbol, fractional_digits,
                   is_default, starting_balance, allow_overdraft, overdraft_floor
            FROM currencies
            ORDER BY is_default DESC, id
            "#,
        )
        .fetch_all(pool)
        .await?;

        let currencies = rows
            .into_iter()
            .map(Currency::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let registry = Self::from_currencies(currencies)?;
        tracing::debug!(count = registry.len(), "Currency registry loaded");
        Ok(registry)
    }

    /// Look up a currency by id
    pub fn resolve(&self, currency_id: &str) -> Result<&Currency, DomainError> {
        self.by_id
            .get(currency_id)
            .map(|&index| &self.currencies[index])
            .ok_or_else(|| DomainError::UnknownCurrency(currency_id.to_string()))
    }

    /// The single default currency
    pub fn default_currency(&self) -> &Currency {
        &self.currencies[self.default_index]
    }

    /// Every currency, default first
    pub fn list(&self) -> &[Currency] {
        &self.currencies
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}
