//! Order repository over a key-value store.
//!
//! Every order is kept twice: the JSON record at `order:{id}` and the member
//! `order:{id}` of the index set `orders`. Insert and delete touch both in a
//! single atomic [`Batch`], so a record never exists without its index entry
//! or the other way round.

use std::pin::Pin;

use common::OrderId;
use futures_core::Stream;
use futures_util::{TryStreamExt, stream};
use kv_store::{Batch, CommitOutcome, KvStore, SCAN_START, cancellable};
use tokio_util::sync::CancellationToken;

use crate::error::{RepositoryError, Result};
use crate::order::Order;

/// Name of the set that indexes every stored order.
pub const ORDER_INDEX: &str = "orders";

/// Returns the key of the primary record for `order_id`.
pub fn order_key(order_id: OrderId) -> String {
    format!("order:{order_id}")
}

/// A request for one page of [`OrderRepository::find_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindAllPage {
    /// Cursor returned by the previous page, or [`SCAN_START`] to begin.
    pub offset: u64,

    /// Amount of index work to do for this page. Must be greater than zero.
    pub size: usize,
}

impl FindAllPage {
    pub fn new(offset: u64, size: usize) -> Self {
        Self { offset, size }
    }

    /// The first page of a pass.
    pub fn first(size: usize) -> Self {
        Self::new(SCAN_START, size)
    }
}

/// One page of orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindAllResult {
    pub orders: Vec<Order>,

    /// Cursor for the next page. [`SCAN_START`] means the pass is complete.
    pub cursor: u64,
}

impl FindAllResult {
    /// Returns true if no further pages exist.
    pub fn is_last(&self) -> bool {
        self.cursor == SCAN_START
    }
}

/// A stream of orders.
pub type OrderStream<'a> = Pin<Box<dyn Stream<Item = Result<Order>> + Send + 'a>>;

/// Stores orders in a [`KvStore`] and keeps the index consistent.
///
/// Holds no locks of its own; concurrent callers are only serialized by the
/// store's atomic batches. Two concurrent updates of the same order race and
/// the last write wins.
#[derive(Debug, Clone)]
pub struct OrderRepository<S> {
    store: S,
}

impl<S: KvStore> OrderRepository<S> {
    /// Creates a repository over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stores a new order and adds it to the index.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a record with the same id exists; in that case
    /// nothing is written.
    #[tracing::instrument(skip(self, cancel, order), fields(order_id = %order.order_id))]
    pub async fn insert(&self, cancel: &CancellationToken, order: &Order) -> Result<()> {
        let key = order_key(order.order_id);
        let value = encode(order)?;

        let batch = Batch::new()
            .set_if_absent(key.clone(), value)
            .set_add(ORDER_INDEX, key);

        match cancellable(cancel, self.store.commit(batch)).await? {
            CommitOutcome::Applied => {
                metrics::counter!("orders_inserted_total").increment(1);
                tracing::info!("order inserted");
                Ok(())
            }
            CommitOutcome::NotApplied { .. } => Err(RepositoryError::AlreadyExists(order.order_id)),
        }
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn find_by_id(&self, cancel: &CancellationToken, order_id: OrderId) -> Result<Order> {
        let key = order_key(order_id);
        match cancellable(cancel, self.store.get(&key)).await? {
            Some(value) => decode(&key, &value),
            None => Err(RepositoryError::NotFound(order_id)),
        }
    }

    /// Overwrites the record of an existing order. The index is left as is.
    ///
    /// There is no version check: of two concurrent updates the later one
    /// wins.
    #[tracing::instrument(skip(self, cancel, order), fields(order_id = %order.order_id))]
    pub async fn update(&self, cancel: &CancellationToken, order: &Order) -> Result<()> {
        let key = order_key(order.order_id);
        let value = encode(order)?;

        let batch = Batch::new().set_if_present(key, value);

        match cancellable(cancel, self.store.commit(batch)).await? {
            CommitOutcome::Applied => {
                metrics::counter!("orders_updated_total").increment(1);
                Ok(())
            }
            CommitOutcome::NotApplied { .. } => Err(RepositoryError::NotFound(order.order_id)),
        }
    }

    /// Removes an order and its index entry.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete_by_id(&self, cancel: &CancellationToken, order_id: OrderId) -> Result<()> {
        let key = order_key(order_id);

        let batch = Batch::new()
            .delete_if_present(key.clone())
            .set_remove(ORDER_INDEX, key);

        match cancellable(cancel, self.store.commit(batch)).await? {
            CommitOutcome::Applied => {
                metrics::counter!("orders_deleted_total").increment(1);
                tracing::info!("order deleted");
                Ok(())
            }
            CommitOutcome::NotApplied { .. } => Err(RepositoryError::NotFound(order_id)),
        }
    }

    /// Reads one page of orders by advancing a scan of the index.
    ///
    /// Index entries whose record is missing are skipped. A page may hold
    /// fewer orders than `size`, or none, without being the last one; keep
    /// going until [`FindAllResult::is_last`].
    #[tracing::instrument(skip(self, cancel, page), fields(offset = page.offset, size = page.size))]
    pub async fn find_all(
        &self,
        cancel: &CancellationToken,
        page: FindAllPage,
    ) -> Result<FindAllResult> {
        if page.size == 0 {
            return Err(RepositoryError::InvalidPageSize);
        }

        let scan = cancellable(cancel, self.store.sscan(ORDER_INDEX, page.offset, page.size)).await?;
        let values = cancellable(cancel, self.store.mget(&scan.members)).await?;

        let mut orders = Vec::with_capacity(values.len());
        for (key, value) in scan.members.iter().zip(values) {
            let Some(value) = value else {
                tracing::debug!(%key, "skipping index entry without record");
                metrics::counter!("orders_stale_index_entries_total").increment(1);
                continue;
            };
            orders.push(decode(key, &value)?);
        }

        Ok(FindAllResult {
            orders,
            cursor: scan.cursor,
        })
    }

    /// Walks every page of [`find_all`](Self::find_all) and yields the
    /// orders one by one.
    ///
    /// The stream ends after the last page or at the first error.
    pub fn stream_all<'a>(&'a self, cancel: &CancellationToken, page_size: usize) -> OrderStream<'a> {
        let cancel = cancel.clone();

        let pages = stream::try_unfold(Some(SCAN_START), move |cursor| {
            let cancel = cancel.clone();
            async move {
                let Some(offset) = cursor else {
                    return Ok::<_, RepositoryError>(None);
                };
                let page = self
                    .find_all(&cancel, FindAllPage::new(offset, page_size))
                    .await?;
                let next = (!page.is_last()).then_some(page.cursor);
                Ok(Some((page.orders, next)))
            }
        });

        Box::pin(
            pages
                .map_ok(|orders| stream::iter(orders.into_iter().map(Ok::<_, RepositoryError>)))
                .try_flatten(),
        )
    }

    /// Number of entries in the index.
    pub async fn count(&self, cancel: &CancellationToken) -> Result<u64> {
        Ok(cancellable(cancel, self.store.scard(ORDER_INDEX)).await?)
    }
}

fn encode(order: &Order) -> Result<String> {
    serde_json::to_string(order).map_err(RepositoryError::Encode)
}

fn decode(key: &str, value: &str) -> Result<Order> {
    serde_json::from_str(value).map_err(|source| RepositoryError::Decode {
        key: key.to_string(),
        source,
    })
}
