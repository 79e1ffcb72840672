//! Service error types.

use domain::DomainError;
use kv_store::KvStoreError;
use thiserror::Error;

/// Errors raised while configuring, starting or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value {value:?} for {var}: {reason}")]
    InvalidConfig {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// The store could not be reached at startup.
    #[error("Failed to connect to store at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: KvStoreError,
    },

    /// Logging or metrics could not be installed.
    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),

    /// An order operation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
