//! game_ledger - in-game economy ledger service
//!
//! Prepares the database for the economy: connects the pool, applies
//! migrations, synchronises currency definitions and verifies the schema,
//! then keeps the pool open until shutdown.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use game_ledger::{Config, CurrencyFile, CurrencyRegistry, Database, LedgerService, LogFormat, Migrator};

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "game_ledger=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(config.log_format);

    tracing::info!(environment = %config.environment, "Starting game_ledger");
    tracing::info!("Connecting to database...");

    let db = Database::connect(&config.database).await?;
    db.verify_connection().await?;

    let applied = Migrator::embedded().migrate(db.pool()).await?;
    tracing::info!(applied, "Migrations complete");

    let registry = match &config.currencies_file {
        Some(path) => {
            let file = CurrencyFile::from_file(path)?;
            CurrencyRegistry::sync(db.pool(), &file).await?
        }
        None => CurrencyRegistry::load(db.pool()).await?,
    };

    if !db.check_schema().await? {
        tracing::error!("Database schema is not complete");
        db.close().await;
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    let ledger = LedgerService::new(db.clone(), Arc::new(registry), config.read_retry);

    for currency in ledger.list_currencies() {
        tracing::info!(
            id = %currency.id,
            symbol = %currency.symbol,
            fractional_digits = currency.fractional_digits,
            default = currency.is_default,
            "Currency available"
        );
    }

    let accounts = ledger.accounts().count_accounts().await?;
    let status = db.status();
    tracing::info!(
        accounts,
        pool_size = status.size,
        pool_idle = status.idle,
        "Ledger ready"
    );

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    db.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
