//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::RetryPolicy;

/// Upper bound on the configured read-retry backoff
const MAX_READ_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection pool settings
    pub database: DatabaseConfig,

    /// Currency definitions file; when unset the persisted currencies are used as-is
    pub currencies_file: Option<PathBuf>,

    /// Retry policy for read-only operations
    pub read_retry: RetryPolicy,

    /// Log output format
    pub log_format: LogFormat,

    /// Environment (development, production)
    pub environment: String,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    pub min_connections: u32,

    /// How long `acquire` waits before reporting the pool as exhausted
    pub acquire_timeout: Duration,

    /// Idle connection timeout
    pub idle_timeout: Duration,

    /// Maximum connection lifetime
    pub max_lifetime: Duration,

    /// Liveness probe run on every acquisition
    pub validation_query: String,
}

impl DatabaseConfig {
    /// Settings suitable for local development against `database_url`
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
            validation_query: "SELECT 1".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let defaults = DatabaseConfig::new(database_url);

        let max_connections: u32 =
            parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"));
        }

        let min_connections: u32 =
            parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", defaults.min_connections)?;
        if min_connections > max_connections {
            return Err(ConfigError::InvalidValue("DATABASE_MIN_CONNECTIONS"));
        }

        let acquire_timeout = Duration::from_secs(parse_or(
            &lookup,
            "DATABASE_ACQUIRE_TIMEOUT_SECS",
            defaults.acquire_timeout.as_secs(),
        )?);
        if acquire_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("DATABASE_ACQUIRE_TIMEOUT_SECS"));
        }

        let idle_timeout = Duration::from_secs(parse_or(
            &lookup,
            "DATABASE_IDLE_TIMEOUT_SECS",
            defaults.idle_timeout.as_secs(),
        )?);

        let max_lifetime = Duration::from_secs(parse_or(
            &lookup,
            "DATABASE_MAX_LIFETIME_SECS",
            defaults.max_lifetime.as_secs(),
        )?);

        let validation_query = lookup("DATABASE_VALIDATION_QUERY")
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(defaults.validation_query);

        let currencies_file = lookup("CURRENCIES_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let read_retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "READ_RETRY_ATTEMPTS", RetryPolicy::default().max_attempts)?,
            base_backoff: Duration::from_millis(parse_or(
                &lookup,
                "READ_RETRY_BACKOFF_MS",
                RetryPolicy::default().base_backoff.as_millis() as u64,
            )?),
        };
        if read_retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue("READ_RETRY_ATTEMPTS"));
        }
        if read_retry.base_backoff > MAX_READ_RETRY_BACKOFF {
            return Err(ConfigError::InvalidValue("READ_RETRY_BACKOFF_MS"));
        }

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        Ok(Self {
            database: DatabaseConfig {
                database_url: defaults.database_url,
                max_connections,
                min_connections,
                acquire_timeout,
                idle_timeout,
                max_lifetime,
                validation_query,
            },
            currencies_file,
            read_retry,
            log_format,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),

    #[error("Cannot read currency file {path}: {reason}")]
    CurrencyFile { path: PathBuf, reason: String },

    #[error("Invalid currency configuration: {0}")]
    InvalidCurrencies(String),
}
