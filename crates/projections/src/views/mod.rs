//! Read model views for the query side.

pub mod order_history;
pub mod user_orders;

#[cfg(test)]
pub(crate) mod test_support;

use domain::OrderEvent;
use event_store::PositionedEvent;

use crate::{ProjectionError, Result};

pub use order_history::{OrderHistoryView, OrderTimeline, TimelineEntry};
pub use user_orders::{OrderSummary, UserOrdersView};

/// Decodes an order event; events from other streams give `None`.
fn order_event(positioned: &PositionedEvent) -> Result<Option<OrderEvent>> {
    let event = &positioned.event;
    if event.aggregate_type != "Order" {
        return Ok(None);
    }
    serde_json::from_value(event.payload.clone())
        .map(Some)
        .map_err(|source| ProjectionError::UnreadableEvent {
            event_type: event.event_type.clone(),
            position: positioned.position,
            source,
        })
}
