use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    Batch, BatchOp, CommitOutcome, KvStoreError, Result,
    store::{KvStore, SCAN_START, ScanPage},
};

/// Set members are kept ordered by a 64-bit hash, which doubles as the scan
/// cursor. Resuming "from hash h" stays correct when members are added or
/// removed between steps.
type ScanSet = BTreeSet<(u64, String)>;

#[derive(Default)]
struct Inner {
    values: HashMap<String, String>,
    sets: HashMap<String, ScanSet>,
}

impl Inner {
    fn check_value_key(&self, key: &str) -> Result<()> {
        if self.sets.contains_key(key) {
            return Err(KvStoreError::WrongType {
                key: key.to_string(),
                expected: "string",
            });
        }
        Ok(())
    }

    fn check_set_key(&self, key: &str) -> Result<()> {
        if self.values.contains_key(key) {
            return Err(KvStoreError::WrongType {
                key: key.to_string(),
                expected: "set",
            });
        }
        Ok(())
    }

    /// Checks key types and preconditions against the state before the
    /// batch. Returns the index of the first failing precondition.
    fn check(&self, batch: &Batch) -> Result<Option<usize>> {
        let mut failed = None;
        for (i, op) in batch.ops().iter().enumerate() {
            let holds = match op {
                BatchOp::SetIfAbsent { key, .. } => {
                    self.check_value_key(key)?;
                    !self.values.contains_key(key)
                }
                BatchOp::SetIfPresent { key, .. } | BatchOp::DeleteIfPresent { key } => {
                    self.check_value_key(key)?;
                    self.values.contains_key(key)
                }
                BatchOp::SetAdd { set, .. } | BatchOp::SetRemove { set, .. } => {
                    self.check_set_key(set)?;
                    true
                }
            };
            if !holds && failed.is_none() {
                failed = Some(i);
            }
        }
        Ok(failed)
    }

    fn apply(&mut self, op: BatchOp) {
        match op {
            BatchOp::SetIfAbsent { key, value } | BatchOp::SetIfPresent { key, value } => {
                self.values.insert(key, value);
            }
            BatchOp::DeleteIfPresent { key } => {
                self.values.remove(&key);
            }
            BatchOp::SetAdd { set, member } => {
                let hash = member_hash(&member);
                self.sets.entry(set).or_default().insert((hash, member));
            }
            BatchOp::SetRemove { set, member } => {
                if let Some(members) = self.sets.get_mut(&set) {
                    members.remove(&(member_hash(&member), member));
                    // Empty sets cease to exist, as in Redis.
                    if members.is_empty() {
                        self.sets.remove(&set);
                    }
                }
            }
        }
    }
}

fn member_hash(member: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    member.hash(&mut hasher);
    // 0 is the scan sentinel and must never be a resume position.
    hasher.finish().max(1)
}

/// In-memory key-value store implementation for testing.
///
/// Offers the same semantics as the Redis implementation: atomic batches,
/// cursor-based set scans, and missing keys reported as None.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    inner: Arc<RwLock<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryKvStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of plain values stored.
    pub async fn value_count(&self) -> usize {
        self.inner.read().await.values.len()
    }

    /// Clears all values and sets.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.values.clear();
        inner.sets.clear();
    }

    /// Makes every subsequent operation fail with `Unavailable` until
    /// switched back. Simulates a lost connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KvStoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        inner.check_value_key(key)?;
        Ok(inner.values.get(key).cloned())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(keys.iter().map(|key| inner.values.get(key).cloned()).collect())
    }

    async fn sismember(&self, set: &str, member: &str) -> Result<bool> {
        self.check_available()?;
        let inner = self.inner.read().await;
        inner.check_set_key(set)?;
        Ok(inner
            .sets
            .get(set)
            .is_some_and(|members| members.contains(&(member_hash(member), member.to_string()))))
    }

    async fn scard(&self, set: &str) -> Result<u64> {
        self.check_available()?;
        let inner = self.inner.read().await;
        inner.check_set_key(set)?;
        Ok(inner.sets.get(set).map_or(0, |members| members.len() as u64))
    }

    async fn sscan(&self, set: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        self.check_available()?;
        let inner = self.inner.read().await;
        inner.check_set_key(set)?;

        let Some(all) = inner.sets.get(set) else {
            return Ok(ScanPage::default());
        };

        let count = count.max(1);
        let mut members = Vec::new();
        let mut last_hash = None;
        let mut entries = all.range((cursor, String::new())..).peekable();

        // Members sharing a hash are never split across steps, otherwise
        // resuming at that hash would return some of them twice.
        while let Some((hash, member)) = entries.peek().copied() {
            if members.len() >= count && last_hash != Some(*hash) {
                break;
            }
            last_hash = Some(*hash);
            members.push(member.clone());
            entries.next();
        }

        let cursor = entries.peek().map_or(SCAN_START, |(hash, _)| *hash);
        Ok(ScanPage { cursor, members })
    }

    async fn commit(&self, batch: Batch) -> Result<CommitOutcome> {
        batch.validate()?;
        self.check_available()?;

        let mut inner = self.inner.write().await;
        if let Some(op) = inner.check(&batch)? {
            tracing::debug!(op, name = batch.ops()[op].name(), "batch not applied");
            return Ok(CommitOutcome::NotApplied { op });
        }

        for op in batch.into_ops() {
            inner.apply(op);
        }

        Ok(CommitOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KvStoreExt;

    #[tokio::test]
    async fn set_if_absent_writes_value() {
        let store = InMemoryKvStore::new();

        let outcome = store
            .commit(Batch::new().set_if_absent("k", "v1"))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn failed_precondition_writes_nothing() {
        let store = InMemoryKvStore::new();
        store
            .commit(Batch::new().set_if_absent("k", "v1"))
            .await
            .unwrap();

        let outcome = store
            .commit(
                Batch::new()
                    .set_add("idx", "k")
                    .set_if_absent("k", "v2"),
            )
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::NotApplied { op: 1 });
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));
        assert!(!store.sismember("idx", "k").await.unwrap());
    }

    #[tokio::test]
    async fn set_if_present_requires_key() {
        let store = InMemoryKvStore::new();

        let outcome = store
            .commit(Batch::new().set_if_present("k", "v"))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::NotApplied { op: 0 });
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_value_and_member() {
        let store = InMemoryKvStore::new();
        store
            .commit(Batch::new().set_if_absent("k", "v").set_add("idx", "k"))
            .await
            .unwrap();

        let outcome = store
            .commit(Batch::new().delete_if_present("k").set_remove("idx", "k"))
            .await
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.scard("idx").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mget_reports_missing_keys_in_place() {
        let store = InMemoryKvStore::new();
        store
            .commit(Batch::new().set_if_absent("a", "1").set_if_absent("c", "3"))
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.mget(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn sscan_visits_every_member_once() {
        let store = InMemoryKvStore::new();
        let mut batch = Batch::new();
        for i in 0..57 {
            batch = batch.set_add("idx", format!("m{i}"));
        }
        store.commit(batch).await.unwrap();

        let mut seen = Vec::new();
        let mut cursor = SCAN_START;
        let mut steps = 0;
        loop {
            let page = store.sscan("idx", cursor, 10).await.unwrap();
            assert!(page.members.len() <= 10);
            let last = page.is_last();
            cursor = page.cursor;
            seen.extend(page.members);
            steps += 1;
            if last {
                break;
            }
        }

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 57);
        assert_eq!(steps, 6);
    }

    #[tokio::test]
    async fn sscan_survives_removal_between_steps() {
        let store = InMemoryKvStore::new();
        let mut batch = Batch::new();
        for i in 0..20 {
            batch = batch.set_add("idx", format!("m{i}"));
        }
        store.commit(batch).await.unwrap();

        let first = store.sscan("idx", SCAN_START, 5).await.unwrap();
        let removed = first.members[0].clone();
        store
            .commit(Batch::new().set_remove("idx", removed.clone()))
            .await
            .unwrap();

        let mut seen = first.members.clone();
        let mut cursor = first.cursor;
        while cursor != SCAN_START {
            let page = store.sscan("idx", cursor, 5).await.unwrap();
            seen.extend(page.members);
            cursor = page.cursor;
        }

        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len());
        assert_eq!(seen.len(), 20);
    }

    #[tokio::test]
    async fn sscan_of_missing_set_is_empty_and_finished() {
        let store = InMemoryKvStore::new();
        let page = store.sscan("nothing", SCAN_START, 10).await.unwrap();
        assert!(page.members.is_empty());
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn wrong_type_is_an_error() {
        let store = InMemoryKvStore::new();
        store
            .commit(Batch::new().set_add("idx", "m"))
            .await
            .unwrap();

        let result = store.get("idx").await;
        assert!(matches!(result, Err(KvStoreError::WrongType { .. })));

        let result = store.commit(Batch::new().set_if_absent("idx", "v")).await;
        assert!(matches!(result, Err(KvStoreError::WrongType { .. })));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryKvStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.ping().await,
            Err(KvStoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.commit(Batch::new().set_if_absent("k", "v")).await,
            Err(KvStoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert_eq!(store.value_count().await, 0);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let store = InMemoryKvStore::new();
        store
            .commit(Batch::new().set_if_absent("k", "v").set_add("idx", "k"))
            .await
            .unwrap();

        store.clear().await;

        assert_eq!(store.value_count().await, 0);
        assert_eq!(store.scard("idx").await.unwrap(), 0);
    }
}
