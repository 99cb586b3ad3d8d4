//! Database module
//!
//! Connection pool management, schema readiness checks and migrations.

mod migrations;
mod migrator;
mod retry;

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::config::DatabaseConfig;
use crate::error::LedgerResult;

pub use migrations::MIGRATIONS;
pub use migrator::{Migration, MigrationError, Migrator};
pub use retry::RetryPolicy;

/// Tables the ledger cannot run without
const REQUIRED_TABLES: [&str; 5] = [
    "schema_version",
    "currencies",
    "accounts",
    "balances",
    "ledger_entries",
];

/// Pool occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Open physical connections
    pub size: u32,
    /// Open connections not currently handed out
    pub idle: usize,
}

/// Bounded PostgreSQL connection pool.
///
/// Connections are released when their guard drops; a transaction opened on
/// one rolls back unless committed.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool, validating idle connections with the configured
    /// query before they are handed out.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let validation_query: Arc<str> = Arc::from(config.validation_query.as_str());

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .test_before_acquire(false)
            .before_acquire(move |conn, _meta| {
                let query = Arc::clone(&validation_query);
                Box::pin(async move {
                    match sqlx::query(&query).execute(&mut *conn).await {
                        Ok(_) => Ok(true),
                        Err(e) => {
                            tracing::warn!(error = %e, "Discarding connection that failed validation");
                            Ok(false)
                        }
                    }
                })
            })
            .connect(&config.database_url)
            .await?;

        // Fresh connections skip `before_acquire`; a broken query must fail here
        if let Err(e) = sqlx::query(&config.validation_query).execute(&pool).await {
            tracing::error!(error = %e, "Validation query failed");
            pool.close().await;
            return Err(e);
        }

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
            "Database pool ready"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying sqlx pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Acquire a validated connection, or `PoolExhausted` after the timeout
    pub async fn acquire(&self) -> LedgerResult<PoolConnection<Postgres>> {
        Ok(self.pool.acquire().await?)
    }

    /// Begin a transaction on a pooled connection
    pub async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Simple connectivity check
    pub async fn verify_connection(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Check that every required table exists and the persisted schema
    /// version matches the newest migration this build knows.
    pub async fn check_schema(&self) -> Result<bool, sqlx::Error> {
        for table in REQUIRED_TABLES {
            let exists: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = current_schema() AND table_name = $1
                )
                "#,
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                tracing::error!(table, "Required table does not exist");
                return Ok(false);
            }
        }

        let current = Migrator::current_version(&self.pool).await?;
        let latest = Migrator::embedded().latest_version();
        if current != latest {
            tracing::error!(current, latest, "Schema version mismatch");
            return Ok(false);
        }

        tracing::info!(version = current, "Schema verified");
        Ok(true)
    }

    /// Current pool occupancy
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// Close every connection and refuse further acquisitions
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
