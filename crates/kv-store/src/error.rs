use thiserror::Error;

/// Errors that can occur when talking to the key-value store.
///
/// A conditional batch that the store declined to apply is not an error; see
/// [`CommitOutcome`](crate::CommitOutcome).
#[derive(Debug, Error)]
pub enum KvStoreError {
    /// The Redis client reported a failure (I/O, protocol, script error).
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The caller cancelled the operation before the store answered.
    #[error("Operation cancelled")]
    Cancelled,

    /// A batch was rejected before reaching the store.
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// The store is unreachable or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A key holds a value of a different kind than the operation expects.
    #[error("Wrong type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// Result type for key-value store operations.
pub type Result<T> = std::result::Result<T, KvStoreError>;
