//! Configuration module for the review assignment service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Expected Authorization token; any non-empty header is accepted when unset
    pub auth_token: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Deadline for a single request, including its transaction
    pub request_timeout: Duration,
    pub db_max_connections: u32,
    /// Fixed seed for reviewer selection, for reproducible runs
    pub selection_seed: Option<u64>,
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}={value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let auth_token = lookup("REVIEW_AUTH_TOKEN").filter(|t| !t.trim().is_empty());

        let db_path = lookup("REVIEW_DB_PATH")
            .unwrap_or_else(|| "./data/reviews.sqlite".to_string())
            .into();

        let bind_addr = parse_var(&lookup, "REVIEW_BIND_ADDR", "127.0.0.1:8080")?;

        let log_level = lookup("REVIEW_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("REVIEW_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "REVIEW_LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected \"text\" or \"json\"".to_string(),
                })
            }
        };

        let timeout_secs: u64 = parse_var(&lookup, "REVIEW_REQUEST_TIMEOUT_SECS", "30")?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "REVIEW_REQUEST_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let db_max_connections: u32 = parse_var(&lookup, "REVIEW_DB_MAX_CONNECTIONS", "5")?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "REVIEW_DB_MAX_CONNECTIONS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let selection_seed = match lookup("REVIEW_SELECTION_SEED") {
            Some(raw) => Some(parse_value("REVIEW_SELECTION_SEED", &raw)?),
            None => None,
        };

        Ok(Self {
            auth_token,
            db_path,
            bind_addr,
            log_level,
            log_format,
            request_timeout: Duration::from_secs(timeout_secs),
            db_max_connections,
            selection_seed,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(name).unwrap_or_else(|| default.to_string());
    parse_value(name, &raw)
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
