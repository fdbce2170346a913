//! Order status and its transition rules.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// New orders are created `Pending` by the hosted service. The admin console
/// moves them through the workflow; [`OrderStatus::can_transition_to`] is the
/// single source of truth for which moves are legal:
///
/// - `Pending` → `Processing` or `Cancelled`
/// - `Processing` → `Shipped` or `Cancelled`
/// - `Shipped` → `Delivered`
/// - `Delivered` and `Cancelled` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether moving from `self` to `next` is a legal workflow step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether the order has left the fulfillment queue.
    ///
    /// Settled orders (shipped, delivered, cancelled) appear in the admin
    /// console's completed partition; pending and processing orders are the
    /// open partition.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered | Self::Cancelled)
    }

    /// Whether the order counts toward revenue.
    #[must_use]
    pub const fn counts_toward_revenue(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid order status: {0}")]
pub struct StatusParseError(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(StatusParseError(s.to_owned())),
        }
    }
}
