//! Order status state machine.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LifecycleError, Order};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► Shipped ──► Completed
/// ```
///
/// The status is never stored on its own; it is derived from `shipped_at`
/// and `completed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, not yet shipped.
    #[default]
    Created,

    /// Handed to the carrier.
    Shipped,

    /// Delivered (terminal state).
    Completed,
}

impl OrderStatus {
    /// Returns true if the order can be shipped in this state.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if the order can be completed in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    /// Returns the status label stored in `order_status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusTransition {
    Ship,
    Complete,
}

impl StatusTransition {
    /// The status an order ends up in after this transition.
    pub fn target(&self) -> OrderStatus {
        match self {
            StatusTransition::Ship => OrderStatus::Shipped,
            StatusTransition::Complete => OrderStatus::Completed,
        }
    }
}

impl FromStr for StatusTransition {
    type Err = LifecycleError;

    /// Parses a target label. Only `"shipped"` and `"completed"` are
    /// accepted.
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "shipped" => Ok(StatusTransition::Ship),
            "completed" => Ok(StatusTransition::Complete),
            other => Err(LifecycleError::InvalidStatus(other.to_string())),
        }
    }
}

impl Order {
    /// Decides the next version of this order for `transition`, stamping
    /// `now` into the target timestamp.
    ///
    /// The order itself is not modified; persisting the result is up to the
    /// caller.
    pub fn transition(
        &self,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<Order, LifecycleError> {
        let status = self.status();
        let mut next = self.clone();

        match transition {
            StatusTransition::Ship => {
                if !status.can_ship() {
                    return Err(LifecycleError::AlreadyShipped);
                }
                next.shipped_at = Some(now);
            }
            StatusTransition::Complete => {
                if status.is_terminal() {
                    return Err(LifecycleError::AlreadyCompleted);
                }
                if !status.can_complete() {
                    return Err(LifecycleError::MustShipFirst);
                }
                // A clock behind the shipping host must not produce
                // completed_at < shipped_at.
                next.completed_at = Some(
                    self.shipped_at
                        .map_or(now, |shipped_at| now.max(shipped_at)),
                );
            }
        }

        next.order_status = transition.target().as_str().to_string();
        Ok(next)
    }

    /// Shorthand for [`Order::transition`] with [`StatusTransition::Ship`].
    pub fn ship(&self, now: DateTime<Utc>) -> Result<Order, LifecycleError> {
        self.transition(StatusTransition::Ship, now)
    }

    /// Shorthand for [`Order::transition`] with [`StatusTransition::Complete`].
    pub fn complete(&self, now: DateTime<Utc>) -> Result<Order, LifecycleError> {
        self.transition(StatusTransition::Complete, now)
    }
}
