//! Order status state machine and listing filter.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fulfilment lifecycle of an order.
///
/// ```text
/// Pending   -> Verified | Cancelled
/// Verified  -> InTransit | Cancelled
/// InTransit -> Shipped | Delivered
/// Shipped   -> Delivered
/// Delivered -> Returned
/// Returned  -> Refunded
/// ```
///
/// `InTransit` means verified and paid, ready for the warehouse; the order
/// enters it on its own once both have happened. `Shipped` is the hand-off
/// to a carrier. Only the edges listed in [`OrderStatus::legal_targets`]
/// exist. `Cancelled` and `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Verified,
    InTransit,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Verified,
        OrderStatus::InTransit,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
    ];

    /// Statuses reachable in one step from `self`.
    pub fn legal_targets(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Verified, Cancelled],
            Verified => &[InTransit, Cancelled],
            InTransit => &[Shipped, Delivered],
            Shipped => &[Delivered],
            Delivered => &[Returned],
            Returned => &[Refunded],
            Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.legal_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.legal_targets().is_empty()
    }

    /// Nothing has left the warehouse yet; the order may still be cancelled.
    pub fn is_pre_fulfillment(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Verified)
    }

    /// Statuses that only make sense once payment has cleared.
    pub fn requires_confirmed_payment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped
                | OrderStatus::InTransit
                | OrderStatus::Delivered
                | OrderStatus::Returned
                | OrderStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Verified => "Verified",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::InTransit => "InTransit",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
            OrderStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three order listings offered to a shopper.
///
/// `Recent` deliberately folds every non-cancelled status together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFilter {
    #[default]
    Recent,
    Cancelled,
    InTransit,
}

impl OrderFilter {
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            OrderFilter::Recent => status != OrderStatus::Cancelled,
            OrderFilter::Cancelled => status == OrderStatus::Cancelled,
            OrderFilter::InTransit => status == OrderStatus::InTransit,
        }
    }
}

/// Returned when parsing an unknown filter name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order filter `{0}` (expected recent, cancelled or in_transit)")]
pub struct UnknownFilter(pub String);

impl FromStr for OrderFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "recent" => Ok(OrderFilter::Recent),
            "cancelled" => Ok(OrderFilter::Cancelled),
            "in_transit" | "intransit" => Ok(OrderFilter::InTransit),
            _ => Err(UnknownFilter(s.to_string())),
        }
    }
}
