//! Domain layer for the order service.
//!
//! This crate provides:
//! - The persisted `Order` record and its line items
//! - The order status state machine (created, shipped, completed)
//! - `OrderRepository`, which keeps order records and the order index
//!   consistent in a key-value store
//! - `OrderService`, the API the request layer calls

pub mod error;
pub mod order;
pub mod repository;

pub use error::{DomainError, RepositoryError};
pub use order::{
    DEFAULT_PAGE_SIZE, LifecycleError, LineItem, Order, OrderService, OrderStatus,
    StatusTransition,
};
pub use repository::{
    FindAllPage, FindAllResult, ORDER_INDEX, OrderRepository, OrderStream, order_key,
};
