//! Order history read model: the status timeline of every order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Actor, DomainEvent, OrderEvent, OrderStatus, UserId};
use event_store::{EventEnvelope, PositionedEvent, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use super::order_event;
use crate::Result;
use crate::projection::{Checkpoint, Projection};

/// One recorded change to an order.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub version: Version,
    pub event_type: String,

    /// `None` for changes that leave the status alone, such as a payment.
    pub status: Option<OrderStatus>,
    pub actor: Option<Actor>,
    pub at: DateTime<Utc>,

    /// Tracking number, payment reference or cancellation reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTimeline {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub entries: Vec<TimelineEntry>,
}

impl OrderTimeline {
    /// Status after the latest entry that changed it.
    pub fn current_status(&self) -> Option<OrderStatus> {
        self.entries.iter().rev().find_map(|entry| entry.status)
    }
}

#[derive(Default)]
struct OrderHistoryState {
    timelines: HashMap<AggregateId, OrderTimeline>,
    checkpoint: Checkpoint,
}

/// Read model view of each order's status history.
#[derive(Clone, Default)]
pub struct OrderHistoryView {
    state: Arc<RwLock<OrderHistoryState>>,
}

impl OrderHistoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn timeline(&self, order_id: AggregateId) -> Option<OrderTimeline> {
        self.state.read().await.timelines.get(&order_id).cloned()
    }

    /// Like [`timeline`](Self::timeline) but only for the order's owner.
    pub async fn timeline_for(
        &self,
        user_id: UserId,
        order_id: AggregateId,
    ) -> Option<OrderTimeline> {
        self.timeline(order_id)
            .await
            .filter(|timeline| timeline.user_id == user_id)
    }

    pub async fn order_count(&self) -> usize {
        self.state.read().await.timelines.len()
    }
}

fn entry_for(envelope: &EventEnvelope, event: &OrderEvent) -> TimelineEntry {
    let detail = match event {
        OrderEvent::PaymentConfirmed(data) => Some(format!("{} {}", data.method, data.reference)),
        OrderEvent::OrderShipped(data) => data.tracking_number.clone(),
        OrderEvent::OrderCancelled(data) => data.reason.clone(),
        OrderEvent::OrderRefunded(data) => Some(data.amount.to_string()),
        _ => None,
    };

    TimelineEntry {
        version: envelope.version,
        event_type: event.event_type().to_string(),
        status: event.resulting_status(),
        actor: event.actor().cloned(),
        at: event.occurred_at(),
        detail,
    }
}

#[async_trait]
impl Projection for OrderHistoryView {
    fn name(&self) -> &'static str {
        "OrderHistoryView"
    }

    async fn apply(&self, positioned: &PositionedEvent) -> Result<()> {
        let mut state = self.state.write().await;
        if state.checkpoint.covers(positioned.position) {
            return Ok(());
        }
        let decoded = order_event(positioned)?;
        state.checkpoint.claim(positioned.position);
        let Some(order_event) = decoded else {
            return Ok(());
        };

        let event = &positioned.event;
        let entry = entry_for(event, &order_event);
        let order_id = event.aggregate_id;

        if let Some(timeline) = state.timelines.get_mut(&order_id) {
            // Stream versions only grow, so an older or equal one is a repeat.
            if timeline
                .entries
                .last()
                .is_some_and(|last| last.version >= entry.version)
            {
                tracing::debug!(
                    %order_id,
                    version = %entry.version,
                    "timeline entry already recorded"
                );
            } else {
                timeline.entries.push(entry);
            }
            return Ok(());
        }

        match order_event {
            OrderEvent::OrderPlaced(data) => {
                state.timelines.insert(
                    order_id,
                    OrderTimeline {
                        order_id,
                        user_id: data.user_id,
                        entries: vec![entry],
                    },
                );
            }
            _ => {
                tracing::warn!(
                    %order_id,
                    event_type = %event.event_type,
                    "event for unknown order"
                );
            }
        }
        Ok(())
    }

    async fn checkpoint(&self) -> Checkpoint {
        self.state.read().await.checkpoint
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = OrderHistoryState::default();
        Ok(())
    }
}
