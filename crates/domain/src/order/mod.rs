//! Order aggregate: status state machine, payment axis and fulfilment.

mod aggregate;
mod commands;
pub mod consistency;
mod events;
mod payment;
mod service;
mod status;

pub use aggregate::{Order, OrderItem};
pub use commands::{
    AdvanceFulfillment, CancelOrder, ConfirmPayment, FulfillmentStep, UnknownStep, VerifyOrder,
};
pub use events::{
    Actor, OrderCancelledData, OrderEvent, OrderPlacedData, OrderRefundedData, OrderShippedData,
    PaymentConfirmedData, StatusChangedData,
};
pub use payment::{PaymentMethod, PaymentStatus};
pub use service::{OrderDetail, OrderService};
pub use status::{OrderFilter, OrderStatus, UnknownFilter};

use thiserror::Error;

/// Errors raised by order commands.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No order stream, or one the caller may not see.
    #[error("Order not found")]
    NotPlaced,

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid order total: {cents} cents (must be greater than 0)")]
    InvalidTotal { cents: i64 },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Status {status} requires a confirmed payment (payment is {payment:?})")]
    InconsistentStatus {
        status: OrderStatus,
        payment: PaymentStatus,
    },

    #[error("Payment already confirmed with a different reference")]
    PaymentAlreadyConfirmed,
}
