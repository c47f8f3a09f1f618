//! Application configuration loaded from environment variables.
//!
//! Fail-fast loading: required variables must be present and valid or the
//! application exits with a clear error message.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Runtime configuration for the sync service.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Default log filter when `RUST_LOG` is unset.
    pub rust_log: String,
    /// Maximum database pool size.
    pub db_max_connections: u32,
    /// Provider slug used when resolving credentials.
    pub provider: String,
    /// Whether the resolver may fall back to the most recent active
    /// credential of any provider.
    pub credential_fallback: bool,
    /// Total attempt budget per provider HTTP call.
    pub provider_max_retries: u32,
    /// Base backoff between retried provider calls, in milliseconds.
    pub provider_backoff_base_ms: u64,
    /// Delay between request status polls.
    pub poll_interval: Duration,
    /// Maximum number of status polls per sync attempt.
    pub poll_max_attempts: u32,
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            var: name.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                var: name.to_string(),
                message: format!("expected a boolean, got {other:?}"),
            }),
        },
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or any variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        Ok(Self {
            database_url,
            host: optional("HOST", "0.0.0.0"),
            port: parse_var("PORT", 8080)?,
            rust_log: optional("RUST_LOG", "info,juris=debug"),
            db_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            provider: optional("JURIS_PROVIDER", "lexwatch"),
            credential_fallback: parse_bool("JURIS_CREDENTIAL_FALLBACK", false)?,
            provider_max_retries: parse_var("JURIS_PROVIDER_MAX_RETRIES", 3)?,
            provider_backoff_base_ms: parse_var("JURIS_PROVIDER_BACKOFF_MS", 500)?,
            poll_interval: Duration::from_secs(parse_var("JURIS_POLL_INTERVAL_SECS", 5u64)?),
            poll_max_attempts: parse_var("JURIS_POLL_MAX_ATTEMPTS", 24)?,
        })
    }
}
