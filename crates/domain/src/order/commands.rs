//! Order commands.

use std::str::FromStr;

use common::AggregateId;

use crate::command::Command;

use super::{Actor, Order, OrderError, OrderEvent, OrderStatus, PaymentMethod};

/// Command to verify a pending order.
#[derive(Debug, Clone)]
pub struct VerifyOrder {
    pub order_id: AggregateId,
    pub actor: Actor,
}

impl VerifyOrder {
    pub fn new(order_id: AggregateId, actor: Actor) -> Self {
        Self { order_id, actor }
    }
}

impl Command for VerifyOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to record a cleared payment.
#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub order_id: AggregateId,
    pub method: PaymentMethod,

    /// Gateway transaction reference; replays carry the same value.
    pub reference: String,
    pub actor: Actor,
}

impl ConfirmPayment {
    pub fn new(
        order_id: AggregateId,
        method: PaymentMethod,
        reference: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            order_id,
            method,
            reference: reference.into(),
            actor,
        }
    }
}

impl Command for ConfirmPayment {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to cancel an order before fulfilment.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub actor: Actor,
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId, actor: Actor, reason: Option<String>) -> Self {
        Self {
            order_id,
            actor,
            reason,
        }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// A staff-driven fulfilment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentStep {
    Ship { tracking_number: Option<String> },
    Deliver,
    Return,
    Refund,
}

impl FulfillmentStep {
    /// Status the order reaches once the step is applied.
    pub fn target(&self) -> OrderStatus {
        match self {
            FulfillmentStep::Ship { .. } => OrderStatus::Shipped,
            FulfillmentStep::Deliver => OrderStatus::Delivered,
            FulfillmentStep::Return => OrderStatus::Returned,
            FulfillmentStep::Refund => OrderStatus::Refunded,
        }
    }

    pub(crate) fn decide(
        &self,
        order: &Order,
        actor: Actor,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match self {
            FulfillmentStep::Ship { tracking_number } => order.ship(actor, tracking_number.clone()),
            FulfillmentStep::Deliver => order.deliver(actor),
            FulfillmentStep::Return => order.mark_returned(actor),
            FulfillmentStep::Refund => order.refund(actor),
        }
    }
}

/// Returned when parsing an unknown fulfilment step name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fulfillment step `{0}`")]
pub struct UnknownStep(pub String);

impl FromStr for FulfillmentStep {
    type Err = UnknownStep;

    /// Parses the path segment used by the fulfilment endpoints. `ship`
    /// yields a step without a tracking number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ship" => Ok(FulfillmentStep::Ship {
                tracking_number: None,
            }),
            "deliver" => Ok(FulfillmentStep::Deliver),
            "return" => Ok(FulfillmentStep::Return),
            "refund" => Ok(FulfillmentStep::Refund),
            other => Err(UnknownStep(other.to_string())),
        }
    }
}

/// Command to move an order along the fulfilment path.
#[derive(Debug, Clone)]
pub struct AdvanceFulfillment {
    pub order_id: AggregateId,
    pub step: FulfillmentStep,
    pub actor: Actor,
}

impl AdvanceFulfillment {
    pub fn new(order_id: AggregateId, step: FulfillmentStep) -> Self {
        Self {
            order_id,
            step,
            actor: Actor::Fulfillment,
        }
    }
}

impl Command for AdvanceFulfillment {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_payment_command() {
        let order_id = AggregateId::new();
        let cmd = ConfirmPayment::new(
            order_id,
            PaymentMethod::RazorPay,
            "pay_1",
            Actor::PaymentGateway,
        );
        assert_eq!(cmd.aggregate_id(), order_id);
        assert_eq!(cmd.reference, "pay_1");
    }

    #[test]
    fn test_fulfillment_defaults_to_staff_actor() {
        let cmd = AdvanceFulfillment::new(AggregateId::new(), FulfillmentStep::Deliver);
        assert_eq!(cmd.actor, Actor::Fulfillment);
        assert_eq!(cmd.step.target(), OrderStatus::Delivered);
    }

    #[test]
    fn test_step_parsing() {
        assert_eq!(
            "ship".parse::<FulfillmentStep>().unwrap(),
            FulfillmentStep::Ship {
                tracking_number: None
            }
        );
        assert_eq!(
            "refund".parse::<FulfillmentStep>().unwrap().target(),
            OrderStatus::Refunded
        );
        assert!("teleport".parse::<FulfillmentStep>().is_err());
        assert!("transit".parse::<FulfillmentStep>().is_err());
    }
}
