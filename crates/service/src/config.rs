//! Application configuration loaded from environment variables.

use domain::DEFAULT_PAGE_SIZE;

use crate::error::{Result, ServiceError};

/// Default store address.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `REDIS_URL`: store address (default: `"redis://127.0.0.1:6379"`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `ORDERS_PAGE_SIZE`: page size for order listing (default: `50`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub redis_url: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub page_size: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a variable is set to a value that cannot be
    /// used.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => parse_log_format(&value)?,
            None => defaults.log_format,
        };

        let page_size = match lookup("ORDERS_PAGE_SIZE") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(0) => return Err(invalid("ORDERS_PAGE_SIZE", &value, "must be greater than zero")),
                Ok(size) => size,
                Err(e) => return Err(invalid("ORDERS_PAGE_SIZE", &value, e.to_string())),
            },
            None => defaults.page_size,
        };

        Ok(Self {
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            page_size,
        })
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat> {
    match value.trim().to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(invalid("LOG_FORMAT", value, "expected \"text\" or \"json\"")),
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ServiceError {
    ServiceError::InvalidConfig {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
