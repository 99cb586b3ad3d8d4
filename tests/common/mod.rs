//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use game_ledger::{
    CurrencyFile, CurrencyRegistry, Database, DatabaseConfig, LedgerService, Migrator, RetryPolicy,
};

pub const DOLLAR: &str = "dollar";
pub const GEM: &str = "gem";

/// Dollars (2 digits, default) and gems (whole units, 5 to start, may go to -10)
pub const CURRENCIES_JSON: &str = r#"
{
    "default_currency": "dollar",
    "currencies": [
        {
            "id": "dollar",
            "name_singular": "Dollar",
            "name_plural": "Dollars",
            "symbol": "$",
            "fractional_digits": 2
        },
        {
            "id": "gem",
            "name_singular": "Gem",
            "name_plural": "Gems",
            "symbol": "G",
            "fractional_digits": 0,
            "starting_balance": "5",
            "overdraft_floor": "-10"
        }
    ]
}
"#;

pub fn database_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests")
}

/// Connect with default pool settings, leaving the data alone
pub async fn connect() -> Database {
    Database::connect(&DatabaseConfig::new(database_url()))
        .await
        .expect("Failed to connect to DB")
}

/// Connect, migrate and wipe the database
pub async fn setup_test_db() -> Database {
    let config = DatabaseConfig {
        max_connections: 10,
        ..DatabaseConfig::new(database_url())
    };

    let db = Database::connect(&config)
        .await
        .expect("Failed to connect to DB");

    Migrator::embedded()
        .migrate(db.pool())
        .await
        .expect("Failed to migrate");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE ledger_entries, balances, accounts, currencies CASCADE")
        .execute(db.pool())
        .await
        .expect("Failed to clean up DB");

    db
}

/// Fresh database with the test currencies synced, wrapped in a ledger
pub async fn setup_ledger() -> LedgerService {
    let db = setup_test_db().await;

    let file = CurrencyFile::from_json(CURRENCIES_JSON).expect("Invalid test currencies");
    let registry = CurrencyRegistry::sync(db.pool(), &file)
        .await
        .expect("Failed to sync currencies");

    LedgerService::new(db, Arc::new(registry), RetryPolicy::default())
}
