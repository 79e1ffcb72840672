use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Batch, CommitOutcome, KvStoreError, Result};

/// Cursor value that starts a set scan, and that a scan returns once it has
/// completed a full pass.
pub const SCAN_START: u64 = 0;

/// One step of an incremental set scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next call. [`SCAN_START`] means the pass is over.
    pub cursor: u64,

    /// Members returned by this step, in store-defined order.
    pub members: Vec<String>,
}

impl ScanPage {
    /// Returns true if this step finished the pass.
    pub fn is_last(&self) -> bool {
        self.cursor == SCAN_START
    }
}

/// Core trait for key-value store clients.
///
/// Implementations are shared across concurrent callers and must be
/// thread-safe (Send + Sync). Cross-key consistency is only provided by
/// [`commit`](KvStore::commit).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Round-trips to the store to check it is reachable.
    async fn ping(&self) -> Result<()>;

    /// Reads a plain value. Returns None if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Reads many plain values in one round trip.
    ///
    /// The result has one slot per requested key, in request order; missing
    /// keys come back as None.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Returns true if `member` is in the set at `set`.
    async fn sismember(&self, set: &str, member: &str) -> Result<bool>;

    /// Number of members in the set at `set` (0 if it does not exist).
    async fn scard(&self, set: &str) -> Result<u64>;

    /// Advances an incremental scan of the set at `set`.
    ///
    /// `count` is the amount of work the store should do for this step. A
    /// member present for the entire pass is returned at least once; members
    /// added or removed during the pass may or may not be.
    async fn sscan(&self, set: &str, cursor: u64, count: usize) -> Result<ScanPage>;

    /// Applies a batch atomically.
    ///
    /// Preconditions of conditional operations are all checked before any
    /// write. If one fails, nothing is written and
    /// [`CommitOutcome::NotApplied`] names the first failing operation.
    async fn commit(&self, batch: Batch) -> Result<CommitOutcome>;
}

/// Extension trait providing convenience methods for key-value stores.
#[async_trait]
pub trait KvStoreExt: KvStore {
    /// Checks whether a plain value exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Follows an [`sscan`](KvStore::sscan) pass to the end and collects
    /// every member. Intended for tests and small sets.
    async fn scan_all(&self, set: &str, count: usize) -> Result<Vec<String>> {
        let mut members = Vec::new();
        let mut cursor = SCAN_START;
        loop {
            let page = self.sscan(set, cursor, count).await?;
            members.extend(page.members);
            if page.cursor == SCAN_START {
                return Ok(members);
            }
            cursor = page.cursor;
        }
    }
}

// Blanket implementation for all KvStore implementations
impl<T: KvStore + ?Sized> KvStoreExt for T {}

/// Runs a store call until it completes or `cancel` fires, whichever is
/// first. On cancellation the call is dropped and `Cancelled` is returned.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(KvStoreError::Cancelled),
        result = fut => result,
    }
}
