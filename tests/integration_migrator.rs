//! Integration tests for the schema migrator and the connection pool
//!
//! Need a PostgreSQL reachable through `DATABASE_URL`:
//! `cargo test -- --ignored`

use std::time::Duration;

use game_ledger::db::{Migration, MigrationError, Migrator};
use game_ledger::{CurrencyFile, CurrencyRegistry, Database, DatabaseConfig, LedgerError};
use serial_test::serial;

mod common;

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_second_migration_run_is_noop() {
    let db = common::setup_test_db().await;
    let migrator = Migrator::embedded();

    let version_before = Migrator::current_version(db.pool()).await.unwrap();
    assert_eq!(version_before, migrator.latest_version());

    assert_eq!(migrator.migrate(db.pool()).await.unwrap(), 0);
    assert_eq!(
        Migrator::current_version(db.pool()).await.unwrap(),
        version_before
    );
    assert!(migrator.pending(db.pool()).await.unwrap().is_empty());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(rows, migrator.latest_version());
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_schema_check_passes_after_migration() {
    let db = common::setup_test_db().await;

    db.verify_connection().await.unwrap();
    assert!(db.check_schema().await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_database_ahead_of_build_is_rejected() {
    let db = common::setup_test_db().await;
    let migrator = Migrator::embedded();
    let future_version = migrator.latest_version() + 100;

    sqlx::query("INSERT INTO schema_version (version, description) VALUES ($1, 'from the future')")
        .bind(future_version)
        .execute(db.pool())
        .await
        .unwrap();

    let result = migrator.migrate(db.pool()).await;
    let check = db.check_schema().await;

    sqlx::query("DELETE FROM schema_version WHERE version = $1")
        .bind(future_version)
        .execute(db.pool())
        .await
        .unwrap();

    assert!(matches!(
        result,
        Err(MigrationError::SchemaAhead { found, .. }) if found == future_version
    ));
    assert!(!check.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_failing_step_leaves_version_at_last_commit() {
    let db = common::setup_test_db().await;
    let latest = Migrator::embedded().latest_version();

    let mut migrations = game_ledger::db::MIGRATIONS.to_vec();
    migrations.push(Migration {
        version: latest + 1,
        description: "scratch table",
        sql: "CREATE TABLE IF NOT EXISTS migrator_scratch (id INT)",
    });
    migrations.push(Migration {
        version: latest + 2,
        description: "broken",
        sql: "CREATE TABLE migrator_broken (id INT); SELECT * FROM missing_table",
    });
    let migrator = Migrator::new(migrations).unwrap();

    let err = migrator.migrate(db.pool()).await.unwrap_err();
    let version = Migrator::current_version(db.pool()).await.unwrap();

    let broken_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'migrator_broken')",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();

    // Restore the embedded schema state
    sqlx::query("DROP TABLE IF EXISTS migrator_scratch")
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("DELETE FROM schema_version WHERE version > $1")
        .bind(latest)
        .execute(db.pool())
        .await
        .unwrap();

    assert!(matches!(err, MigrationError::Failed { version, .. } if version == latest + 2));
    assert_eq!(version, latest + 1);
    assert!(!broken_exists);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_currency_sync_moves_default_and_protects_digits() {
    let db = common::setup_test_db().await;

    let file = CurrencyFile::from_json(common::CURRENCIES_JSON).unwrap();
    let registry = CurrencyRegistry::sync(db.pool(), &file).await.unwrap();
    assert_eq!(registry.default_currency().id, common::DOLLAR);
    assert_eq!(registry.len(), 2);

    // Same definitions, gems become the default
    let mut moved = file.clone();
    moved.default_currency = common::GEM.to_string();
    let registry = CurrencyRegistry::sync(db.pool(), &moved).await.unwrap();
    assert_eq!(registry.default_currency().id, common::GEM);

    let reloaded = CurrencyRegistry::load(db.pool()).await.unwrap();
    assert_eq!(reloaded.default_currency().id, common::GEM);
    assert!(!reloaded.resolve(common::DOLLAR).unwrap().is_default);

    // Rescaling an existing currency would reinterpret stored balances
    let mut rescaled = file.clone();
    rescaled.currencies[0].fractional_digits = 3;
    let err = CurrencyRegistry::sync(db.pool(), &rescaled).await.unwrap_err();
    assert!(matches!(err, LedgerError::Config(_)));
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_broken_validation_query_fails_connect() {
    let config = DatabaseConfig {
        validation_query: "SELECT * FROM no_such_table".to_string(),
        ..DatabaseConfig::new(common::database_url())
    };

    assert!(Database::connect(&config).await.is_err());
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_idle_connection_failing_validation_is_replaced() {
    // Fails only on a session that set the poison flag
    let config = DatabaseConfig {
        max_connections: 1,
        min_connections: 0,
        acquire_timeout: Duration::from_secs(2),
        validation_query: "SELECT (COALESCE(current_setting('game_ledger.poison', true), '') || '1')::INT"
            .to_string(),
        ..DatabaseConfig::new(common::database_url())
    };
    let db = Database::connect(&config).await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    let pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    sqlx::query("SET game_ledger.poison = 'on'")
        .execute(&mut *conn)
        .await
        .unwrap();
    drop(conn);

    db.verify_connection().await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    let fresh_pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    let poison: Option<String> =
        sqlx::query_scalar("SELECT current_setting('game_ledger.poison', true)")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
    drop(conn);

    assert_ne!(fresh_pid, pid);
    assert_ne!(poison.as_deref(), Some("on"));
    db.close().await;
}
