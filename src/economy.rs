//! Economy contract
//!
//! The narrow, platform-independent boundary host adapters call into.
//! Amounts cross it as display-unit decimals (`10.50` dollars) and are
//! converted to minor units with the currency's fractional digits. Values
//! more precise than the currency allows are rejected, never rounded.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::currency::Currency;
use crate::domain::{
    decimal_from_f64, non_negative_minor_units, Account, Amount, DomainError, OperationContext,
};
use crate::error::LedgerResult;
use crate::ledger::LedgerService;

/// Operations every platform adapter is written against
#[async_trait]
pub trait Economy: Send + Sync {
    async fn get_or_create_account(&self, account_id: Uuid) -> LedgerResult<Account>;

    async fn has_account(&self, account_id: Uuid) -> LedgerResult<bool>;

    async fn get_balance(&self, account_id: Uuid, currency_id: &str) -> LedgerResult<Decimal>;

    async fn deposit(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<Decimal>;

    async fn withdraw(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<Decimal>;

    /// Returns the new `(from, to)` balances
    async fn transfer(
        &self,
        from: Uuid,
        to: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<(Decimal, Decimal)>;

    async fn set_balance(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<Decimal>;

    fn list_currencies(&self) -> Vec<Currency>;

    fn default_currency(&self) -> Currency;
}

#[async_trait]
impl Economy for LedgerService {
    async fn get_or_create_account(&self, account_id: Uuid) -> LedgerResult<Account> {
        LedgerService::get_or_create_account(self, account_id, &OperationContext::new()).await
    }

    async fn has_account(&self, account_id: Uuid) -> LedgerResult<bool> {
        LedgerService::has_account(self, account_id).await
    }

    async fn get_balance(&self, account_id: Uuid, currency_id: &str) -> LedgerResult<Decimal> {
        let minor = LedgerService::get_balance(self, account_id, currency_id).await?;
        Ok(self.currencies().resolve(currency_id)?.to_display(minor))
    }

    async fn deposit(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<Decimal> {
        let currency = self.currencies().resolve(currency_id)?;
        let minor = positive_minor(currency, amount)?;
        let balance = LedgerService::deposit(self, account_id, currency_id, minor, context).await?;
        Ok(currency.to_display(balance))
    }

    async fn withdraw(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<Decimal> {
        let currency = self.currencies().resolve(currency_id)?;
        let minor = positive_minor(currency, amount)?;
        let balance = LedgerService::withdraw(self, account_id, currency_id, minor, context).await?;
        Ok(currency.to_display(balance))
    }

    async fn transfer(
        &self,
        from: Uuid,
        to: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<(Decimal, Decimal)> {
        let currency = self.currencies().resolve(currency_id)?;
        let minor = positive_minor(currency, amount)?;
        let outcome =
            LedgerService::transfer(self, from, to, currency_id, minor, context).await?;
        Ok((
            currency.to_display(outcome.from_balance),
            currency.to_display(outcome.to_balance),
        ))
    }

    async fn set_balance(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: Decimal,
        context: &OperationContext,
    ) -> LedgerResult<Decimal> {
        let currency = self.currencies().resolve(currency_id)?;
        let minor = non_negative_minor_units(amount, currency.fractional_digits)
            .map_err(DomainError::from)?;
        let balance =
            LedgerService::set_balance(self, account_id, currency_id, minor, context).await?;
        Ok(currency.to_display(balance))
    }

    fn list_currencies(&self) -> Vec<Currency> {
        LedgerService::list_currencies(self).to_vec()
    }

    fn default_currency(&self) -> Currency {
        self.currencies().default_currency().clone()
    }
}

fn positive_minor(currency: &Currency, amount: Decimal) -> Result<i64, DomainError> {
    Ok(Amount::new(amount)?.to_minor_units(currency.fractional_digits)?)
}

/// Float amount from a legacy provider, rounded half away from zero to the
/// currency's precision. NaN and infinities are `InvalidAmount`.
pub fn amount_from_f64(currency: &Currency, value: f64) -> Result<Decimal, DomainError> {
    decimal_from_f64(value, currency.fractional_digits).map_err(DomainError::from)
}
