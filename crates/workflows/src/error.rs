//! Workflow error types.

use domain::{DomainError, OrderError};
use thiserror::Error;

use crate::mail::MailError;
use crate::payment::PaymentError;
use crate::token::TokenError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Unknown order, or an order owned by someone else.
    #[error("Order not found")]
    OrderNotFound,

    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    #[error("Confirmation link rejected: {0}")]
    Token(#[from] TokenError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Payment error: {0}")]
    Payment(PaymentError),

    #[error("Domain error: {0}")]
    Domain(DomainError),
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Order(OrderError::NotPlaced) => WorkflowError::OrderNotFound,
            other => WorkflowError::Domain(other),
        }
    }
}

impl From<OrderError> for WorkflowError {
    fn from(err: OrderError) -> Self {
        DomainError::from(err).into()
    }
}

impl From<PaymentError> for WorkflowError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined { reason } => WorkflowError::PaymentDeclined { reason },
            other => WorkflowError::Payment(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
