//! Domain error types.

use common::OrderId;
use kv_store::KvStoreError;
use thiserror::Error;

use crate::order::LifecycleError;

/// Errors that can occur in the order repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No record exists for the order.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// A record already exists for the order.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// The store failed or the call was cancelled.
    #[error("Store error: {0}")]
    Store(#[from] KvStoreError),

    /// A stored record could not be decoded.
    #[error("Failed to decode record at {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// An order could not be encoded for storage.
    #[error("Failed to encode order: {0}")]
    Encode(#[source] serde_json::Error),

    /// Listing was requested with a page size of zero.
    #[error("Page size must be greater than zero")]
    InvalidPageSize,
}

impl RepositoryError {
    /// Returns true if the failure came from a cancelled call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RepositoryError::Store(KvStoreError::Cancelled))
    }
}

/// Errors returned by [`OrderService`](crate::OrderService).
#[derive(Debug, Error)]
pub enum DomainError {
    /// The repository rejected or failed the operation.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The requested status change is not allowed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl DomainError {
    /// Returns true if the order does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::Repository(RepositoryError::NotFound(_)))
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
