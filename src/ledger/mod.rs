//! Ledger Service
//!
//! The only writer of balances and ledger entries. Every mutation is one
//! database transaction: lock the affected balance rows, compute, validate,
//! write the balance together with its log entry, commit. Any early return
//! drops the transaction guard, which rolls back and releases the connection.
//!
//! Amounts here are minor units. Display-unit conversion happens at the
//! [`Economy`](crate::economy::Economy) boundary.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::currency::{Currency, CurrencyRegistry};
use crate::db::{Database, RetryPolicy};
use crate::domain::{
    Account, AmountError, Balance, DomainError, EntryCause, EntryFilter, LedgerEntry, NewEntry,
    OperationContext,
};
use crate::error::LedgerResult;
use crate::journal::TransactionLog;
use crate::store::AccountStore;

/// Balances after a completed transfer, in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub from_balance: i64,
    pub to_balance: i64,
    /// Shared by the two ledger entries of the transfer
    pub correlation_id: Uuid,
}

/// Transactional balance mutations over the account store
#[derive(Debug, Clone)]
pub struct LedgerService {
    db: Database,
    currencies: Arc<CurrencyRegistry>,
    accounts: AccountStore,
    journal: TransactionLog,
    read_retry: RetryPolicy,
}

impl LedgerService {
    pub fn new(db: Database, currencies: Arc<CurrencyRegistry>, read_retry: RetryPolicy) -> Self {
        Self {
            accounts: AccountStore::new(db.clone()),
            journal: TransactionLog::new(db.clone()),
            db,
            currencies,
            read_retry,
        }
    }

    pub fn currencies(&self) -> &CurrencyRegistry {
        &self.currencies
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn journal(&self) -> &TransactionLog {
        &self.journal
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Return the account, creating it (and seeding starting balances) on
    /// first touch. Idempotent under concurrent callers.
    pub async fn get_or_create_account(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> LedgerResult<Account> {
        logged(
            "get_or_create_account",
            self.try_get_or_create_account(account_id, context).await,
        )
    }

    /// Whether the account exists
    pub async fn has_account(&self, account_id: Uuid) -> LedgerResult<bool> {
        logged(
            "has_account",
            self.read_retry
                .run("has_account", || self.accounts.has_account(account_id))
                .await,
        )
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current balance in minor units; zero for an untouched account
    pub async fn get_balance(&self, account_id: Uuid, currency_id: &str) -> LedgerResult<i64> {
        logged("get_balance", self.try_get_balance(account_id, currency_id).await)
    }

    /// Every materialized balance of an account
    pub async fn list_balances(&self, account_id: Uuid) -> LedgerResult<Vec<Balance>> {
        logged(
            "list_balances",
            self.read_retry
                .run("list_balances", || self.accounts.list_balances(account_id))
                .await,
        )
    }

    /// Ledger entries of an account, newest first
    pub async fn list_entries(
        &self,
        account_id: Uuid,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        logged("list_entries", self.try_list_entries(account_id, filter).await)
    }

    /// Every known currency, default first
    pub fn list_currencies(&self) -> &[Currency] {
        self.currencies.list()
    }

    /// Format a display-unit amount with the currency's symbol
    pub fn format(&self, currency_id: &str, amount: Decimal) -> Result<String, DomainError> {
        Ok(self.currencies.resolve(currency_id)?.format(amount))
    }

    // =========================================================================
    // Mutations (never retried)
    // =========================================================================

    /// Add `amount > 0` minor units; returns the new balance
    pub async fn deposit(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<i64> {
        logged(
            "deposit",
            self.try_deposit(account_id, currency_id, amount, context).await,
        )
    }

    /// Remove `amount > 0` minor units; `InsufficientFunds` when the result
    /// would fall below the currency's floor
    pub async fn withdraw(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<i64> {
        logged(
            "withdraw",
            self.try_withdraw(account_id, currency_id, amount, context).await,
        )
    }

    /// Move `amount > 0` minor units between two existing accounts in one
    /// transaction. Rows are locked in ascending account-id order.
    ///
    /// Both sides must already exist: an untouched source is rejected with
    /// `UnknownAccount`, not `InsufficientFunds`.
    pub async fn transfer(
        &self,
        from: Uuid,
        to: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<TransferOutcome> {
        logged(
            "transfer",
            self.try_transfer(from, to, currency_id, amount, context).await,
        )
    }

    /// Administrative override to `amount >= 0` minor units. Skips the
    /// sufficiency check and is logged with its own cause.
    pub async fn set_balance(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<i64> {
        logged(
            "set_balance",
            self.try_set_balance(account_id, currency_id, amount, context).await,
        )
    }

    // =========================================================================
    // Implementations
    // =========================================================================

    async fn try_get_or_create_account(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> LedgerResult<Account> {
        let mut tx = self.db.begin().await?;
        let (account, created) = self.accounts.get_or_create_account(&mut tx, account_id).await?;
        if created {
            self.seed_starting_balances(&mut tx, account_id, context).await?;
        }
        tx.commit().await?;
        Ok(account)
    }

    async fn try_get_balance(&self, account_id: Uuid, currency_id: &str) -> LedgerResult<i64> {
        let currency = self.currencies.resolve(currency_id)?;
        let balance = self
            .read_retry
            .run("get_balance", || self.accounts.get_balance(account_id, &currency.id))
            .await?;
        Ok(balance.amount)
    }

    async fn try_list_entries(
        &self,
        account_id: Uuid,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        if let Some(currency_id) = &filter.currency_id {
            self.currencies.resolve(currency_id)?;
        }
        self.read_retry
            .run("list_entries", || self.journal.list_entries(account_id, filter))
            .await
    }

    async fn try_deposit(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<i64> {
        let currency = self.currencies.resolve(currency_id)?;
        let amount = positive(currency, amount)?;

        let mut tx = self.db.begin().await?;
        self.open_account(&mut tx, account_id, context).await?;

        let current = self.accounts.lock_balance(&mut tx, account_id, &currency.id).await?;
        let new_balance = current.checked_add(amount).ok_or(AmountError::Overflow)?;

        self.record(
            &mut tx,
            entry(account_id, currency, amount, new_balance, EntryCause::Deposit, context),
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(%account_id, currency = %currency.id, amount, new_balance, "Deposit");
        Ok(new_balance)
    }

    async fn try_withdraw(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<i64> {
        let currency = self.currencies.resolve(currency_id)?;
        let amount = positive(currency, amount)?;

        let mut tx = self.db.begin().await?;
        self.open_account(&mut tx, account_id, context).await?;

        let current = self.accounts.lock_balance(&mut tx, account_id, &currency.id).await?;
        let new_balance = debit(currency, current, amount)?;

        self.record(
            &mut tx,
            entry(account_id, currency, -amount, new_balance, EntryCause::Withdraw, context),
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(%account_id, currency = %currency.id, amount, new_balance, "Withdraw");
        Ok(new_balance)
    }

    async fn try_transfer(
        &self,
        from: Uuid,
        to: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<TransferOutcome> {
        if from == to {
            return Err(DomainError::SameAccount.into());
        }
        let currency = self.currencies.resolve(currency_id)?;
        let amount = positive(currency, amount)?;

        let mut tx = self.db.begin().await?;
        for account_id in [from, to] {
            if !self.accounts.account_exists(&mut tx, account_id).await? {
                return Err(DomainError::UnknownAccount(account_id).into());
            }
        }

        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let first_balance = self.accounts.lock_balance(&mut tx, first, &currency.id).await?;
        let second_balance = self.accounts.lock_balance(&mut tx, second, &currency.id).await?;
        let (from_current, to_current) = if first == from {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        let from_balance = debit(currency, from_current, amount)?;
        let to_balance = to_current.checked_add(amount).ok_or(AmountError::Overflow)?;

        let mut context = context.clone();
        let correlation_id = context.ensure_correlation_id();

        self.record(
            &mut tx,
            entry(from, currency, -amount, from_balance, EntryCause::TransferOut, &context),
        )
        .await?;
        self.record(
            &mut tx,
            entry(to, currency, amount, to_balance, EntryCause::TransferIn, &context),
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(
            %from,
            %to,
            currency = %currency.id,
            amount,
            %correlation_id,
            "Transfer"
        );
        Ok(TransferOutcome {
            from_balance,
            to_balance,
            correlation_id,
        })
    }

    async fn try_set_balance(
        &self,
        account_id: Uuid,
        currency_id: &str,
        amount: i64,
        context: &OperationContext,
    ) -> LedgerResult<i64> {
        let currency = self.currencies.resolve(currency_id)?;
        if amount < 0 {
            return Err(AmountError::Negative(currency.to_display(amount)).into());
        }

        let mut tx = self.db.begin().await?;
        self.open_account(&mut tx, account_id, context).await?;

        let current = self.accounts.lock_balance(&mut tx, account_id, &currency.id).await?;
        let delta = amount.checked_sub(current).ok_or(AmountError::Overflow)?;

        self.record(
            &mut tx,
            entry(account_id, currency, delta, amount, EntryCause::SetBalance, context),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            %account_id,
            currency = %currency.id,
            previous = current,
            amount,
            "Balance set"
        );
        Ok(amount)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Lazily create the account inside a mutation
    async fn open_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        context: &OperationContext,
    ) -> LedgerResult<()> {
        if self.accounts.ensure_account(tx, account_id).await? {
            self.seed_starting_balances(tx, account_id, context).await?;
        }
        Ok(())
    }

    async fn seed_starting_balances(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        context: &OperationContext,
    ) -> LedgerResult<()> {
        for currency in self.currencies.list() {
            let starting = currency.starting_balance;
            if starting > 0 {
                self.record(
                    tx,
                    entry(account_id, currency, starting, starting, EntryCause::StartingBalance, context),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Write the balance and its log entry on the same transaction
    async fn record(&self, tx: &mut Transaction<'_, Postgres>, entry: NewEntry) -> LedgerResult<()> {
        self.accounts
            .upsert_balance(tx, entry.account_id, &entry.currency_id, entry.resulting_balance)
            .await?;
        self.journal.append(tx, &entry).await?;
        Ok(())
    }
}

/// Log failures the way their class demands, then hand the result back
fn logged<T>(operation: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
    if let Err(e) = &result {
        e.log(operation);
    }
    result
}

fn positive(currency: &Currency, amount: i64) -> Result<i64, DomainError> {
    if amount <= 0 {
        return Err(AmountError::NotPositive(currency.to_display(amount)).into());
    }
    Ok(amount)
}

/// Balance after removing `amount`, refusing to cross the currency floor
fn debit(currency: &Currency, current: i64, amount: i64) -> Result<i64, DomainError> {
    let floor = currency.floor();
    match current.checked_sub(amount) {
        Some(new_balance) if new_balance >= floor => Ok(new_balance),
        _ => Err(DomainError::insufficient_funds(
            amount,
            current.saturating_sub(floor).max(0),
        )),
    }
}

fn entry(
    account_id: Uuid,
    currency: &Currency,
    delta: i64,
    resulting_balance: i64,
    cause: EntryCause,
    context: &OperationContext,
) -> NewEntry {
    NewEntry {
        account_id,
        currency_id: currency.id.clone(),
        delta,
        resulting_balance,
        cause,
        correlation_id: context.correlation_id,
        reason: context.reason.clone(),
    }
}
