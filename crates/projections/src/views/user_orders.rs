//! User orders read model: each shopper's orders in placement order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Money, OrderEvent, OrderFilter, OrderStatus, PaymentStatus, UserId};
use event_store::PositionedEvent;
use serde::Serialize;
use tokio::sync::RwLock;

use super::order_event;
use crate::Result;
use crate::projection::{Checkpoint, Projection};

/// One row of a shopper's order listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub status: OrderStatus,
    pub payment: PaymentStatus,
    pub item_count: u32,
    pub total_price: Money,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct UserOrdersState {
    /// Order IDs per user, in commit order.
    by_user: HashMap<UserId, Vec<AggregateId>>,
    orders: HashMap<AggregateId, OrderSummary>,
    checkpoint: Checkpoint,
}

/// Read model behind the Recent / Cancelled / In transit listings.
#[derive(Clone, Default)]
pub struct UserOrdersView {
    state: Arc<RwLock<UserOrdersState>>,
}

impl UserOrdersView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders of `user_id` matching `filter`, oldest first.
    pub async fn list(&self, user_id: UserId, filter: OrderFilter) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        state
            .by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|order_id| state.orders.get(order_id))
            .filter(|summary| filter.matches(summary.status))
            .cloned()
            .collect()
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<OrderSummary> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl Projection for UserOrdersView {
    fn name(&self) -> &'static str {
        "UserOrdersView"
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
        let order_id = event.aggregate_id;

        if let OrderEvent::OrderPlaced(data) = &order_event {
            if state.orders.contains_key(&order_id) {
                tracing::debug!(%order_id, "order already listed");
                return Ok(());
            }
            state.by_user.entry(data.user_id).or_default().push(order_id);
            state.orders.insert(
                order_id,
                OrderSummary {
                    order_id,
                    status: OrderStatus::Pending,
                    payment: data.payment.clone(),
                    item_count: data.items.iter().map(|item| item.quantity).sum(),
                    total_price: data.total_price,
                    placed_at: data.placed_at,
                    updated_at: data.placed_at,
                },
            );
            return Ok(());
        }

        let Some(summary) = state.orders.get_mut(&order_id) else {
            tracing::warn!(%order_id, event_type = %event.event_type, "event for unknown order");
            return Ok(());
        };
        if let Some(status) = order_event.resulting_status() {
            summary.status = status;
        }
        if let OrderEvent::PaymentConfirmed(data) = order_event {
            summary.payment = PaymentStatus::confirmed(data.method, data.reference);
        }
        summary.updated_at = event.timestamp;
        Ok(())
    }

    async fn checkpoint(&self) -> Checkpoint {
        self.state.read().await.checkpoint
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = UserOrdersState::default();
        Ok(())
    }
}
