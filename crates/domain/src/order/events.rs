//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{AddressId, Money, UserId};

use super::{OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

/// Who authorised a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Customer(UserId),
    /// A signed confirmation link from an email.
    EmailLink,
    PaymentGateway,
    Fulfillment,
    System,
}

/// Events recorded on an order stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),
    OrderVerified(StatusChangedData),
    PaymentConfirmed(PaymentConfirmedData),
    /// Verified and paid; handed to fulfilment (status `InTransit`).
    FulfillmentStarted(StatusChangedData),
    OrderShipped(OrderShippedData),
    OrderDelivered(StatusChangedData),
    OrderCancelled(OrderCancelledData),
    OrderReturned(StatusChangedData),
    OrderRefunded(OrderRefundedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderVerified(_) => "OrderVerified",
            OrderEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            OrderEvent::FulfillmentStarted(_) => "FulfillmentStarted",
            OrderEvent::OrderShipped(_) => "OrderShipped",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderReturned(_) => "OrderReturned",
            OrderEvent::OrderRefunded(_) => "OrderRefunded",
        }
    }
}

impl OrderEvent {
    /// Status the order enters when this event is applied, if it changes.
    pub fn resulting_status(&self) -> Option<OrderStatus> {
        match self {
            OrderEvent::OrderPlaced(_) => Some(OrderStatus::Pending),
            OrderEvent::OrderVerified(_) => Some(OrderStatus::Verified),
            OrderEvent::PaymentConfirmed(_) => None,
            OrderEvent::FulfillmentStarted(_) => Some(OrderStatus::InTransit),
            OrderEvent::OrderShipped(_) => Some(OrderStatus::Shipped),
            OrderEvent::OrderDelivered(_) => Some(OrderStatus::Delivered),
            OrderEvent::OrderCancelled(_) => Some(OrderStatus::Cancelled),
            OrderEvent::OrderReturned(_) => Some(OrderStatus::Returned),
            OrderEvent::OrderRefunded(_) => Some(OrderStatus::Refunded),
        }
    }

    pub fn actor(&self) -> Option<&Actor> {
        match self {
            OrderEvent::OrderPlaced(_) => None,
            OrderEvent::PaymentConfirmed(data) => Some(&data.actor),
            OrderEvent::OrderShipped(data) => Some(&data.actor),
            OrderEvent::OrderCancelled(data) => Some(&data.actor),
            OrderEvent::OrderRefunded(data) => Some(&data.actor),
            OrderEvent::OrderVerified(data)
            | OrderEvent::FulfillmentStarted(data)
            | OrderEvent::OrderDelivered(data)
            | OrderEvent::OrderReturned(data) => Some(&data.actor),
        }
    }

    /// When the change happened, as recorded by the command.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(data) => data.placed_at,
            OrderEvent::PaymentConfirmed(data) => data.at,
            OrderEvent::OrderShipped(data) => data.at,
            OrderEvent::OrderCancelled(data) => data.at,
            OrderEvent::OrderRefunded(data) => data.at,
            OrderEvent::OrderVerified(data)
            | OrderEvent::FulfillmentStarted(data)
            | OrderEvent::OrderDelivered(data)
            | OrderEvent::OrderReturned(data) => data.at,
        }
    }

    pub(crate) fn status_changed(status: OrderStatus, actor: Actor) -> Option<Self> {
        let data = StatusChangedData {
            actor,
            at: Utc::now(),
        };
        match status {
            OrderStatus::Verified => Some(OrderEvent::OrderVerified(data)),
            OrderStatus::InTransit => Some(OrderEvent::FulfillmentStarted(data)),
            OrderStatus::Delivered => Some(OrderEvent::OrderDelivered(data)),
            OrderStatus::Returned => Some(OrderEvent::OrderReturned(data)),
            _ => None,
        }
    }
}

/// Point-in-time copy of the cart at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub user_id: UserId,
    /// Cart the items were copied from.
    pub cart_id: AggregateId,
    /// Shipping address, by reference.
    pub address_id: AddressId,
    pub items: Vec<OrderItem>,
    pub total_price: Money,
    pub payment: PaymentStatus,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmedData {
    pub method: PaymentMethod,
    pub reference: String,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub tracking_number: Option<String>,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: Option<String>,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRefundedData {
    pub amount: Money,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}
