//! Persisted order record.

use chrono::{DateTime, Utc};
use common::{CustomerId, ItemId, OrderId};
use serde::{Deserialize, Deserializer, Serialize};

use super::OrderStatus;

/// One purchased item in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The catalogue item.
    pub item_id: ItemId,

    /// Number of units.
    pub quantity: u32,

    /// Unit price in the smallest currency unit.
    pub price: u64,
}

impl LineItem {
    pub fn new(item_id: ItemId, quantity: u32, price: u64) -> Self {
        Self {
            item_id,
            quantity,
            price,
        }
    }

    /// `quantity * price`, saturating at `u64::MAX`.
    pub fn total_price(&self) -> u64 {
        self.price.saturating_mul(u64::from(self.quantity))
    }
}

/// An order as stored under `order:{order_id}`.
///
/// The lifecycle is carried by the timestamps: `shipped_at` and
/// `completed_at` are each set once, and `completed_at` only after
/// `shipped_at`. `order_status` is an informational label refreshed whenever
/// the status changes; use [`Order::status`] for decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,

    pub customer_id: CustomerId,

    /// Line items in insertion order.
    #[serde(
        rename = "line_item",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub line_items: Vec<LineItem>,

    #[serde(default)]
    pub order_status: String,

    pub created_at: DateTime<Utc>,

    pub shipped_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,
}

/// Records written by older producers carry `"line_item": null` for orders
/// without items.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LineItem>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Order {
    /// Creates a freshly placed order: not shipped, not completed.
    pub fn new(
        order_id: OrderId,
        customer_id: CustomerId,
        line_items: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            customer_id,
            line_items,
            order_status: OrderStatus::Created.as_str().to_string(),
            created_at,
            shipped_at: None,
            completed_at: None,
        }
    }

    /// Derives the lifecycle status from the timestamps.
    pub fn status(&self) -> OrderStatus {
        match (self.shipped_at, self.completed_at) {
            (_, Some(_)) => OrderStatus::Completed,
            (Some(_), None) => OrderStatus::Shipped,
            (None, None) => OrderStatus::Created,
        }
    }

    /// Sum of all line totals, saturating at `u64::MAX`.
    pub fn total_price(&self) -> u64 {
        self.line_items
            .iter()
            .fold(0u64, |total, item| total.saturating_add(item.total_price()))
    }
}
