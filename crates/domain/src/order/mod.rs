//! Order record, lifecycle and service.

mod lifecycle;
mod model;
mod service;

pub use lifecycle::{OrderStatus, StatusTransition};
pub use model::{LineItem, Order};
pub use service::{DEFAULT_PAGE_SIZE, OrderService};

use thiserror::Error;

/// Errors raised when a requested status change is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The requested target is neither `shipped` nor `completed`.
    #[error("Invalid status: {0:?} (expected \"shipped\" or \"completed\")")]
    InvalidStatus(String),

    /// The order already has a shipping timestamp.
    #[error("Order already shipped")]
    AlreadyShipped,

    /// The order already has a completion timestamp.
    #[error("Order already completed")]
    AlreadyCompleted,

    /// Completion was requested for an order that was never shipped.
    #[error("Order must be shipped before it can be completed")]
    MustShipFirst,
}
