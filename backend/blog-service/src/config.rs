/// Configuration management for the blog service
///
/// Everything is read from environment variables, after loading `.env` when
/// one is present.
use anyhow::{anyhow, Context, Result};
use db_pool::DbConfig;
use resilience::RetryConfig;
use std::str::FromStr;
use std::time::Duration;

use crate::db::StorageKind;
use crate::notifications::DEFAULT_CAPACITY;
use crate::services::DEFAULT_MAX_PAGE_SIZE;

pub const SERVICE_NAME: &str = "blog-service";

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    pub graphql: GraphQLConfig,
}

/// Deployment environment; selects the log format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Local,
    Dev,
    Prod,
}

impl FromStr for AppEnv {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "local" => AppEnv::Local,
            "dev" | "development" => AppEnv::Dev,
            _ => AppEnv::Prod,
        })
    }
}

/// Application settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: AppEnv,
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Storage backend settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Present only for the PostgreSQL backend
    pub database: Option<DbConfig>,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Events buffered per subscriber before the oldest are dropped
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct GraphQLConfig {
    pub max_depth: usize,
    pub max_complexity: usize,
    pub introspection: bool,
    pub max_page_size: usize,
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_complexity: 1000,
            introspection: true,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// Reads `key`, falling back to `default` when unset. A set but unparseable
/// value is an error.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {key} ({raw:?}): {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine; real deployments set the environment directly
        let _ = dotenvy::dotenv();

        let app = AppConfig {
            env: env_parse("APP_ENV", AppEnv::Local)?,
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("SERVER_PORT", 8080)?,
            workers: env_parse("SERVER_WORKERS", num_cpus::get())?.max(1),
        };

        let kind: StorageKind = std::env::var("STORAGE_TYPE")
            .context("STORAGE_TYPE must be set to 'in-memory' or 'postgres'")?
            .parse()
            .map_err(|e: String| anyhow!(e))?;

        let database = match kind {
            StorageKind::Postgres => Some(DbConfig::from_env(SERVICE_NAME)?),
            StorageKind::InMemory => None,
        };

        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: env_parse("STORAGE_RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_unit: Duration::from_millis(env_parse(
                "STORAGE_RETRY_BACKOFF_UNIT_MS",
                defaults.backoff_unit.as_millis() as u64,
            )?),
            max_backoff: defaults.max_backoff,
        };

        let graphql_defaults = GraphQLConfig::default();
        let graphql = GraphQLConfig {
            max_depth: env_parse("GRAPHQL_MAX_DEPTH", graphql_defaults.max_depth)?,
            max_complexity: env_parse("GRAPHQL_MAX_COMPLEXITY", graphql_defaults.max_complexity)?,
            introspection: env_parse("GRAPHQL_INTROSPECTION", graphql_defaults.introspection)?,
            max_page_size: env_parse("GRAPHQL_MAX_PAGE_SIZE", graphql_defaults.max_page_size)?,
        };

        Ok(Config {
            app,
            storage: StorageConfig {
                kind,
                database,
                retry,
            },
            notifications: NotificationConfig {
                capacity: env_parse("COMMENT_EVENTS_CAPACITY", DEFAULT_CAPACITY)?.max(1),
            },
            graphql,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}
