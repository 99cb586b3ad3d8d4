//! Account Store
//!
//! Account identities and per-currency balance rows. Reads go straight to
//! the pool; writes only happen on a transaction owned by the ledger.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::Database;
use crate::domain::{Account, Balance};
use crate::error::LedgerResult;

/// Persistence for accounts and balances
#[derive(Debug, Clone)]
pub struct AccountStore {
    db: Database,
}

impl AccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Whether the account has been created
    pub async fn has_account(&self, account_id: Uuid) -> LedgerResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
            .bind(account_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(exists)
    }

    /// Fetch an account by id
    pub async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        let row: Option<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, created_at FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(|(account_id, created_at)| Account {
            account_id,
            created_at,
        }))
    }

    /// Balance of one currency; zero when the row was never materialized
    pub async fn get_balance(&self, account_id: Uuid, currency_id: &str) -> LedgerResult<Balance> {
        let amount: Option<i64> = sqlx::query_scalar(
            "SELECT amount FROM balances WHERE account_id = $1 AND currency_id = $2",
        )
        .bind(account_id)
        .bind(currency_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(match amount {
            Some(amount) => Balance {
                account_id,
                currency_id: currency_id.to_string(),
                amount,
            },
            None => Balance::zero(account_id, currency_id),
        })
    }

    /// Every materialized balance of an account
    pub async fn list_balances(&self, account_id: Uuid) -> LedgerResult<Vec<Balance>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT currency_id, amount FROM balances WHERE account_id = $1 ORDER BY currency_id",
        )
        .bind(account_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(currency_id, amount)| Balance {
                account_id,
                currency_id,
                amount,
            })
            .collect())
    }

    /// Number of accounts
    pub async fn count_accounts(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Transactional writes
    // =========================================================================

    /// Insert the account unless it exists. Returns the stored row and
    /// whether this call created it; the loser of a concurrent first touch
    /// gets the winner's row.
    pub async fn get_or_create_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> LedgerResult<(Account, bool)> {
        let created = self.ensure_account(tx, account_id).await?;

        let (account_id, created_at): (Uuid, DateTime<Utc>) =
            sqlx::query_as("SELECT id, created_at FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_one(&mut **tx)
                .await?;

        Ok((
            Account {
                account_id,
                created_at,
            },
            created,
        ))
    }

    /// Whether the account exists, as seen by the transaction
    pub async fn account_exists(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> LedgerResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
            .bind(account_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(exists)
    }

    /// Insert-or-ignore the account row; `true` when it was created here
    pub async fn ensure_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> LedgerResult<bool> {
        let result = sqlx::query("INSERT INTO accounts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(account_id)
            .execute(&mut **tx)
            .await?;

        let created = result.rows_affected() == 1;
        if created {
            tracing::debug!(%account_id, "Account created");
        }
        Ok(created)
    }

    /// Materialize the balance row if absent, then lock it for the rest of
    /// the transaction and return its amount.
    pub async fn lock_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        currency_id: &str,
    ) -> LedgerResult<i64> {
        sqlx::query(
            r#"
            INSERT INTO balances (account_id, currency_id, amount)
            VALUES ($1, $2, 0)
            ON CONFLICT (account_id, currency_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(currency_id)
        .execute(&mut **tx)
        .await?;

        let amount: i64 = sqlx::query_scalar(
            r#"
            SELECT amount FROM balances
            WHERE account_id = $1 AND currency_id = $2
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .bind(currency_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(amount)
    }

    /// Write a new balance amount, inserting the row if absent
    pub async fn upsert_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        currency_id: &str,
        amount: i64,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (account_id, currency_id, amount, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (account_id, currency_id)
            DO UPDATE SET amount = EXCLUDED.amount, updated_at = NOW()
            "#,
        )
        .bind(account_id)
        .bind(currency_id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
