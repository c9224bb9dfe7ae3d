//! Event fixtures shared by the view tests.

use chrono::Utc;
use common::AggregateId;
use domain::order::{OrderCancelledData, OrderPlacedData, StatusChangedData};
use domain::{
    Actor, AddressId, DomainEvent, Money, OrderEvent, OrderItem, PaymentMethod, PaymentStatus,
    ProductId, UserId, Variant,
};
use event_store::{EventEnvelope, LogPosition, PositionedEvent, Version};

pub(crate) fn envelope(
    aggregate_id: AggregateId,
    version: i64,
    event: &OrderEvent,
) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Order")
        .event_type(event.event_type())
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

/// `envelope` as read from the log at `position`.
pub(crate) fn at(position: i64, envelope: EventEnvelope) -> PositionedEvent {
    PositionedEvent {
        position: LogPosition::new(position),
        event: envelope,
    }
}

pub(crate) fn placed(order_id: AggregateId, user_id: UserId) -> OrderEvent {
    OrderEvent::OrderPlaced(OrderPlacedData {
        order_id,
        user_id,
        cart_id: AggregateId::new(),
        address_id: AddressId::new(),
        items: vec![OrderItem {
            product_id: ProductId::new("MUG-01"),
            product_name: "Mug".to_string(),
            variant: Variant::default(),
            quantity: 3,
            unit_price: Money::from_cents(1200),
        }],
        total_price: Money::from_cents(3600),
        payment: PaymentStatus::pending(PaymentMethod::RazorPay),
        placed_at: Utc::now(),
    })
}

pub(crate) fn verified() -> OrderEvent {
    OrderEvent::OrderVerified(StatusChangedData {
        actor: Actor::EmailLink,
        at: Utc::now(),
    })
}

pub(crate) fn cancelled() -> OrderEvent {
    OrderEvent::OrderCancelled(OrderCancelledData {
        reason: Some("changed my mind".to_string()),
        actor: Actor::EmailLink,
        at: Utc::now(),
    })
}
