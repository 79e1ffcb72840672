//! Order service providing the caller-facing API for order operations.

use chrono::Utc;
use common::{CustomerId, OrderId};
use kv_store::KvStore;
use tokio_util::sync::CancellationToken;

use crate::error::DomainError;
use crate::repository::{FindAllPage, FindAllResult, OrderRepository};

use super::{LineItem, Order, StatusTransition};

/// Page size used by [`OrderService::list_orders`] unless configured.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Service for managing orders.
///
/// Composes the lifecycle state machine with the [`OrderRepository`]:
/// status changes are read, validated and written back.
#[derive(Debug, Clone)]
pub struct OrderService<S> {
    repository: OrderRepository<S>,
    page_size: usize,
}

impl<S: KvStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            repository: OrderRepository::new(store),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the page size used by [`list_orders`](Self::list_orders).
    /// Zero falls back to [`DEFAULT_PAGE_SIZE`].
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &OrderRepository<S> {
        &self.repository
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Places a new order for a customer.
    ///
    /// The id is random. A collision with an existing order is reported as
    /// `AlreadyExists` and not retried.
    #[tracing::instrument(skip(self, cancel, line_items), fields(items = line_items.len()))]
    pub async fn create_order(
        &self,
        cancel: &CancellationToken,
        customer_id: CustomerId,
        line_items: Vec<LineItem>,
    ) -> Result<Order, DomainError> {
        let order = Order::new(OrderId::random(), customer_id, line_items, Utc::now());

        self.repository.insert(cancel, &order).await?;

        tracing::info!(order_id = %order.order_id, "order created");
        Ok(order)
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_order(
        &self,
        cancel: &CancellationToken,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        Ok(self.repository.find_by_id(cancel, order_id).await?)
    }

    /// Lists one page of orders starting at `cursor`.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn list_orders(
        &self,
        cancel: &CancellationToken,
        cursor: u64,
    ) -> Result<FindAllResult, DomainError> {
        let page = FindAllPage::new(cursor, self.page_size);
        Ok(self.repository.find_all(cancel, page).await?)
    }

    /// Moves an order to the status named by `label` (`"shipped"` or
    /// `"completed"`).
    ///
    /// The label is checked before the order is read. The read and the write
    /// are not atomic: two concurrent updates of one order can both pass
    /// validation and the later write wins.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn update_status(
        &self,
        cancel: &CancellationToken,
        order_id: OrderId,
        label: &str,
    ) -> Result<Order, DomainError> {
        let transition: StatusTransition = label.parse()?;

        let current = self.repository.find_by_id(cancel, order_id).await?;
        let next = current.transition(transition, Utc::now())?;
        self.repository.update(cancel, &next).await?;

        let to = transition.target().as_str();
        metrics::counter!("order_transitions_total", "to" => to).increment(1);
        tracing::info!(order_id = %order_id, to, "order status changed");

        Ok(next)
    }

    /// Deletes an order.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete_order(
        &self,
        cancel: &CancellationToken,
        order_id: OrderId,
    ) -> Result<(), DomainError> {
        Ok(self.repository.delete_by_id(cancel, order_id).await?)
    }
}
