pub mod batch;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use batch::{Batch, BatchOp, CommitOutcome};
pub use error::{KvStoreError, Result};
pub use memory::InMemoryKvStore;
pub use redis_store::RedisKvStore;
pub use store::{KvStore, KvStoreExt, SCAN_START, ScanPage, cancellable};
