//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::Money;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Payment declined: {reason}")]
    Declined { reason: String },

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown charge: {0}")]
    UnknownCharge(String),
}

/// A charge against a tokenized card.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Idempotency reference chosen by the caller.
    pub reference: String,
    pub amount: Money,
    pub currency: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub charge_id: String,
    pub amount: Money,
}

/// Trait for card payment processing.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentError>;

    /// Reverses a previously made charge.
    async fn refund(&self, charge_id: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: HashMap<String, ChargeRequest>,
    refunded: Vec<String>,
    next_id: u32,
    decline_reason: Option<String>,
    unavailable: bool,
}

/// In-memory gateway for development and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge with `reason` until cleared with `None`.
    pub async fn set_decline(&self, reason: Option<&str>) {
        self.state.lock().await.decline_reason = reason.map(str::to_string);
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Charges taken and not refunded.
    pub async fn charge_count(&self) -> usize {
        self.state.lock().await.charges.len()
    }

    pub async fn refunded(&self) -> Vec<String> {
        self.state.lock().await.refunded.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
        let mut state = self.state.lock().await;

        if state.unavailable {
            return Err(PaymentError::Unavailable("gateway offline".to_string()));
        }
        if let Some(reason) = &state.decline_reason {
            return Err(PaymentError::Declined {
                reason: reason.clone(),
            });
        }

        state.next_id += 1;
        let charge_id = format!("ch_{:06}", state.next_id);
        let amount = request.amount;
        state.charges.insert(charge_id.clone(), request);

        Ok(ChargeReceipt { charge_id, amount })
    }

    async fn refund(&self, charge_id: &str) -> Result<(), PaymentError> {
        let mut state = self.state.lock().await;
        if state.charges.remove(charge_id).is_none() {
            return Err(PaymentError::UnknownCharge(charge_id.to_string()));
        }
        state.refunded.push(charge_id.to_string());
        Ok(())
    }
}
