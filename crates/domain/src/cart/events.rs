//! Cart domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, ProductId, UserId, Variant};

/// Events recorded on a cart stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    CartOpened(CartOpenedData),
    CartItemAdded(CartItemAddedData),
    CartItemRemoved(CartItemRemovedData),
    CartItemQuantityUpdated(CartItemQuantityUpdatedData),
    /// Contents moved into an order at checkout.
    CartDrained(CartDrainedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::CartItemAdded(_) => "CartItemAdded",
            CartEvent::CartItemRemoved(_) => "CartItemRemoved",
            CartEvent::CartItemQuantityUpdated(_) => "CartItemQuantityUpdated",
            CartEvent::CartDrained(_) => "CartDrained",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: AggregateId,
    pub user_id: UserId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemAddedData {
    pub product_id: ProductId,
    pub product_name: String,
    pub variant: Variant,
    pub quantity: u32,
    /// Catalog price at the moment of adding.
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRemovedData {
    pub product_id: ProductId,
    pub variant: Variant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemQuantityUpdatedData {
    pub product_id: ProductId,
    pub variant: Variant,
    pub old_quantity: u32,
    pub new_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartDrainedData {
    /// Order that received the cart's lines.
    pub order_id: AggregateId,
    pub item_count: usize,
    pub total: Money,
    pub drained_at: DateTime<Utc>,
}

impl CartEvent {
    pub fn cart_opened(cart_id: AggregateId, user_id: UserId) -> Self {
        CartEvent::CartOpened(CartOpenedData {
            cart_id,
            user_id,
            opened_at: Utc::now(),
        })
    }

    pub fn item_removed(product_id: ProductId, variant: Variant) -> Self {
        CartEvent::CartItemRemoved(CartItemRemovedData {
            product_id,
            variant,
        })
    }

    pub fn quantity_updated(
        product_id: ProductId,
        variant: Variant,
        old_quantity: u32,
        new_quantity: u32,
    ) -> Self {
        CartEvent::CartItemQuantityUpdated(CartItemQuantityUpdatedData {
            product_id,
            variant,
            old_quantity,
            new_quantity,
        })
    }
}
