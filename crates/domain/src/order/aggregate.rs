//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::cart::CartLine;
use crate::value_objects::{AddressId, Money, ProductId, UserId, Variant};

use super::{
    Actor, OrderError, OrderEvent, OrderStatus, PaymentMethod, PaymentStatus, consistency,
    events::{
        OrderCancelledData, OrderPlacedData, OrderRefundedData, OrderShippedData,
        PaymentConfirmedData,
    },
};

/// A line frozen into an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub variant: Variant,
    pub quantity: u32,
    /// Price captured when the item was added to the cart.
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            variant: line.variant.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

/// A placed order moving through fulfilment.
///
/// Items and total never change after placement. Status and payment move
/// independently but are checked together by [`consistency::validate`]
/// before any event is emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    user_id: Option<UserId>,
    cart_id: Option<AggregateId>,
    address_id: Option<AddressId>,
    items: Vec<OrderItem>,
    total_price: Money,
    status: OrderStatus,
    payment: Option<PaymentStatus>,
    placed_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if let Some(status) = event.resulting_status() {
            self.status = status;
        }

        match event {
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::PaymentConfirmed(data) => {
                self.payment = Some(PaymentStatus::confirmed(data.method, data.reference));
            }
            OrderEvent::OrderVerified(_)
            | OrderEvent::FulfillmentStarted(_)
            | OrderEvent::OrderShipped(_)
            | OrderEvent::OrderDelivered(_)
            | OrderEvent::OrderCancelled(_)
            | OrderEvent::OrderReturned(_)
            | OrderEvent::OrderRefunded(_) => {}
        }
    }
}

// Query methods
impl Order {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn cart_id(&self) -> Option<AggregateId> {
        self.cart_id
    }

    pub fn address_id(&self) -> Option<AddressId> {
        self.address_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment(&self) -> Option<&PaymentStatus> {
        self.payment.as_ref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn is_placed(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn is_paid(&self) -> bool {
        self.payment.as_ref().is_some_and(PaymentStatus::is_confirmed)
    }
}

// Command methods (return events)
impl Order {
    /// Records a new order from a cart snapshot.
    pub fn place(
        &self,
        order_id: AggregateId,
        user_id: UserId,
        cart_id: AggregateId,
        address_id: AddressId,
        items: Vec<OrderItem>,
        payment: PaymentStatus,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let total_price: Money = items.iter().map(OrderItem::line_total).sum();
        if !total_price.is_positive() {
            return Err(OrderError::InvalidTotal {
                cents: total_price.cents(),
            });
        }
        consistency::validate(OrderStatus::Pending, &payment)?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            user_id,
            cart_id,
            address_id,
            items,
            total_price,
            payment,
            placed_at: Utc::now(),
        })])
    }

    /// Marks a pending order as verified by its owner.
    ///
    /// Never regresses: any status past `Pending` is a no-op. An order paid
    /// at checkout goes straight on to fulfilment.
    pub fn verify(&self, actor: Actor) -> Result<Vec<OrderEvent>, OrderError> {
        let payment = self.placed_payment()?;
        if self.status != OrderStatus::Pending {
            return Ok(vec![]);
        }

        let mut events = vec![];
        events.extend(OrderEvent::status_changed(OrderStatus::Verified, actor.clone()));
        let mut status = OrderStatus::Verified;
        if payment.is_confirmed() {
            events.extend(OrderEvent::status_changed(OrderStatus::InTransit, actor));
            status = OrderStatus::InTransit;
        }
        consistency::validate(status, payment)?;

        Ok(events)
    }

    /// Records a cleared payment.
    ///
    /// Replaying the same reference, or confirming a cancelled order, is a
    /// no-op. A verified order moves on to fulfilment.
    pub fn confirm_payment(
        &self,
        method: PaymentMethod,
        reference: &str,
        actor: Actor,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let payment = self.placed_payment()?;
        match payment.reference() {
            Some(existing) if existing == reference => return Ok(vec![]),
            Some(_) => return Err(OrderError::PaymentAlreadyConfirmed),
            None => {}
        }
        if self.status == OrderStatus::Cancelled {
            return Ok(vec![]);
        }

        let confirmed = PaymentStatus::confirmed(method, reference);
        let mut status = self.status;
        let mut events = vec![OrderEvent::PaymentConfirmed(PaymentConfirmedData {
            method,
            reference: reference.to_string(),
            actor: actor.clone(),
            at: Utc::now(),
        })];
        if self.status == OrderStatus::Verified {
            events.extend(OrderEvent::status_changed(OrderStatus::InTransit, actor));
            status = OrderStatus::InTransit;
        }
        consistency::validate(status, &confirmed)?;

        Ok(events)
    }

    /// Cancels a pre-fulfilment order. Cancelling twice is a no-op.
    pub fn cancel(
        &self,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let payment = self.placed_payment()?;
        if self.status == OrderStatus::Cancelled {
            return Ok(vec![]);
        }
        self.ensure_edge(OrderStatus::Cancelled)?;
        consistency::validate(OrderStatus::Cancelled, payment)?;

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelledData {
            reason,
            actor,
            at: Utc::now(),
        })])
    }

    pub fn ship(
        &self,
        actor: Actor,
        tracking_number: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.begin_transition(OrderStatus::Shipped)? {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::OrderShipped(OrderShippedData {
            tracking_number,
            actor,
            at: Utc::now(),
        })])
    }

    pub fn deliver(&self, actor: Actor) -> Result<Vec<OrderEvent>, OrderError> {
        self.plain_transition(OrderStatus::Delivered, actor)
    }

    pub fn mark_returned(&self, actor: Actor) -> Result<Vec<OrderEvent>, OrderError> {
        self.plain_transition(OrderStatus::Returned, actor)
    }

    /// Refunds the full order total.
    pub fn refund(&self, actor: Actor) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.begin_transition(OrderStatus::Refunded)? {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::OrderRefunded(OrderRefundedData {
            amount: self.total_price,
            actor,
            at: Utc::now(),
        })])
    }

    fn plain_transition(
        &self,
        target: OrderStatus,
        actor: Actor,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.begin_transition(target)? {
            return Ok(vec![]);
        }
        Ok(OrderEvent::status_changed(target, actor).into_iter().collect())
    }

    /// Checks a move to `target`. `Ok(false)` means the order is already
    /// there.
    fn begin_transition(&self, target: OrderStatus) -> Result<bool, OrderError> {
        let payment = self.placed_payment()?;
        if self.status == target {
            return Ok(false);
        }
        self.ensure_edge(target)?;
        consistency::validate(target, payment)?;
        Ok(true)
    }

    fn ensure_edge(&self, target: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        Ok(())
    }

    fn placed_payment(&self) -> Result<&PaymentStatus, OrderError> {
        match (&self.id, &self.payment) {
            (Some(_), Some(payment)) => Ok(payment),
            _ => Err(OrderError::NotPlaced),
        }
    }
}

// Event application
impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.user_id = Some(data.user_id);
        self.cart_id = Some(data.cart_id);
        self.address_id = Some(data.address_id);
        self.items = data.items;
        self.total_price = data.total_price;
        self.payment = Some(data.payment);
        self.placed_at = Some(data.placed_at);
    }
}
