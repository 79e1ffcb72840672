//! Identifier types shared across the order service crates.

mod types;

pub use types::{CustomerId, ItemId, OrderId};
