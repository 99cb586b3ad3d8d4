//! Schema Migrator
//!
//! Applies versioned schema changes exactly once. Every step runs in its own
//! transaction together with the `schema_version` row recording it, under a
//! transaction-scoped advisory lock so concurrent processes never apply the
//! same step twice.

use sqlx::{Executor, PgExecutor, PgPool};

use super::migrations::MIGRATIONS;

/// Advisory lock key shared by every process migrating the same database
const MIGRATION_LOCK_KEY: i64 = 0x6c65_6467_6572;

/// A single schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

impl Migration {
    fn failed(&self, source: sqlx::Error) -> MigrationError {
        MigrationError::Failed {
            version: self.version,
            description: self.description,
            source,
        }
    }
}

/// Migration error types
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Migration versions must be positive and strictly increasing (at version {0})")]
    OutOfOrder(i64),

    #[error("Database schema version {found} is newer than the latest known migration {latest}")]
    SchemaAhead { found: i64, latest: i64 },

    #[error("Migration {version} ({description}) failed: {source}")]
    Failed {
        version: i64,
        description: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Ordered set of migrations and the logic to apply them
#[derive(Debug, Clone)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    /// Create a migrator over an explicit migration list
    pub fn new(migrations: Vec<Migration>) -> Result<Self, MigrationError> {
        validate_order(&migrations)?;
        Ok(Self { migrations })
    }

    /// The migrations compiled into this build
    pub fn embedded() -> Self {
        Self {
            migrations: MIGRATIONS.to_vec(),
        }
    }

    /// Newest version this migrator knows; 0 when empty
    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    /// Persisted schema version; 0 when nothing was ever applied
    pub async fn current_version(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let table_exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = 'schema_version'
            )
            "#,
        )
        .fetch_one(pool)
        .await?;

        if !table_exists {
            return Ok(0);
        }

        read_version(pool).await
    }

    /// Migrations that `migrate` would apply, without applying them
    pub async fn pending(&self, pool: &PgPool) -> Result<Vec<Migration>, MigrationError> {
        let current = Self::current_version(pool).await?;
        self.check_not_ahead(current)?;

        Ok(self
            .migrations
            .iter()
            .filter(|m| m.version > current)
            .copied()
            .collect())
    }

    /// Apply every migration newer than the persisted version, ascending.
    ///
    /// Returns how many steps this call applied. A failing step rolls back
    /// and leaves the version at the last committed step.
    pub async fn migrate(&self, pool: &PgPool) -> Result<usize, MigrationError> {
        validate_order(&self.migrations)?;
        ensure_version_table(pool).await?;

        let current = read_version(pool).await?;
        self.check_not_ahead(current)?;

        let latest = self.latest_version();
        if current == latest {
            tracing::info!(version = current, "Schema up to date");
            return Ok(0);
        }

        tracing::info!(from = current, to = latest, "Migrating schema");

        let mut applied = 0;
        for migration in self.migrations.iter().filter(|m| m.version > current) {
            if apply(pool, migration).await? {
                applied += 1;
            }
        }

        tracing::info!(applied, version = latest, "Schema migrated");
        Ok(applied)
    }

    fn check_not_ahead(&self, current: i64) -> Result<(), MigrationError> {
        let latest = self.latest_version();
        if current > latest {
            return Err(MigrationError::SchemaAhead {
                found: current,
                latest,
            });
        }
        Ok(())
    }
}

fn validate_order(migrations: &[Migration]) -> Result<(), MigrationError> {
    let mut previous = 0;
    for migration in migrations {
        if migration.version <= previous {
            return Err(MigrationError::OutOfOrder(migration.version));
        }
        previous = migration.version;
    }
    Ok(())
}

async fn ensure_version_table(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version     BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

async fn read_version<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(executor)
        .await
}

/// Apply one step; `false` when another process got there first
async fn apply(pool: &PgPool, migration: &Migration) -> Result<bool, MigrationError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    // Re-read under the lock
    let current = read_version(&mut *tx).await?;
    if current >= migration.version {
        tracing::debug!(
            version = migration.version,
            "Migration already applied by another process"
        );
        return Ok(false);
    }

    (&mut *tx)
        .execute(migration.sql)
        .await
        .map_err(|e| migration.failed(e))?;

    sqlx::query("INSERT INTO schema_version (version, description) VALUES ($1, $2)")
        .bind(migration.version)
        .bind(migration.description)
        .execute(&mut *tx)
        .await
        .map_err(|e| migration.failed(e))?;

    tx.commit().await.map_err(|e| migration.failed(e))?;

    tracing::info!(
        version = migration.version,
        description = migration.description,
        "Applied migration"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOOP: &str = "SELECT 1";

    fn step(version: i64) -> Migration {
        Migration {
            version,
            description: "step",
            sql: NOOP,
        }
    }

    #[test]
    fn test_embedded_migrations_are_strictly_increasing() {
        assert!(validate_order(MIGRATIONS).is_ok());
        assert!(Migrator::new(MIGRATIONS.to_vec()).is_ok());
        assert_eq!(
            Migrator::embedded().latest_version(),
            MIGRATIONS.last().unwrap().version
        );
    }

    #[test]
    fn test_out_of_order_rejected() {
        let err = Migrator::new(vec![step(1), step(3), step(2)]).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfOrder(2)));

        let err = Migrator::new(vec![step(1), step(1)]).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfOrder(1)));

        let err = Migrator::new(vec![step(0)]).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfOrder(0)));
    }

    #[test]
    fn test_latest_version_of_empty_set_is_zero() {
        assert_eq!(Migrator::new(vec![]).unwrap().latest_version(), 0);
    }

    #[test]
    fn test_database_ahead_of_build_rejected() {
        let migrator = Migrator::new(vec![step(1), step(2)]).unwrap();

        assert!(migrator.check_not_ahead(2).is_ok());
        assert!(matches!(
            migrator.check_not_ahead(5),
            Err(MigrationError::SchemaAhead { found: 5, latest: 2 })
        ));
    }
}
