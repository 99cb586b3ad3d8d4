//! Transaction Log
//!
//! Append-only record of every balance mutation. Entries are written inside
//! the ledger's transaction, so a failed append fails the mutation with it.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::Database;
use crate::domain::{EntryFilter, LedgerEntry, NewEntry};
use crate::error::LedgerResult;

/// Ledger entry persistence
#[derive(Debug, Clone)]
pub struct TransactionLog {
    db: Database,
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    account_id: Uuid,
    currency_id: String,
    delta: i64,
    resulting_balance: i64,
    cause: String,
    correlation_id: Option<Uuid>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = sqlx::Error;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let cause = row
            .cause
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(LedgerEntry {
            id: row.id,
            account_id: row.account_id,
            currency_id: row.currency_id,
            delta: row.delta,
            resulting_balance: row.resulting_balance,
            cause,
            correlation_id: row.correlation_id,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

impl TransactionLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an entry on the ledger's open transaction
    pub async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &NewEntry,
    ) -> LedgerResult<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, account_id, currency_id, delta, resulting_balance,
                cause, correlation_id, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(entry.account_id)
        .bind(&entry.currency_id)
        .bind(entry.delta)
        .bind(entry.resulting_balance)
        .bind(entry.cause.as_str())
        .bind(entry.correlation_id)
        .bind(entry.reason.as_deref())
        .execute(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Entries of an account matching `filter`, newest first
    pub async fn list_entries(
        &self,
        account_id: Uuid,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, currency_id, delta, resulting_balance,
                   cause, correlation_id, reason, created_at
            FROM ledger_entries
            WHERE account_id = $1
              AND ($2::TEXT IS NULL OR currency_id = $2)
              AND ($3::TEXT IS NULL OR cause = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR created_at >= $4)
            ORDER BY seq DESC
            LIMIT $5
            "#,
        )
        .bind(account_id)
        .bind(filter.currency_id.as_deref())
        .bind(filter.cause.map(|c| c.as_str()))
        .bind(filter.since)
        .bind(filter.effective_limit())
        .fetch_all(self.db.pool())
        .await?;

        let entries = rows
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Number of entries recorded for an account
    pub async fn count_entries(&self, account_id: Uuid) -> LedgerResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(count)
    }
}
