//! Payment axis of an order, independent from its fulfilment status.

use serde::{Deserialize, Serialize};

/// How the shopper chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Direct card charge taken before the order is placed.
    Card,
    /// Redirect-based gateway; the result arrives later via callback.
    RazorPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::RazorPay => "RazorPay",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the chosen payment has cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending { method: PaymentMethod },
    Confirmed {
        method: PaymentMethod,
        /// Gateway charge or transaction reference.
        reference: String,
    },
}

impl PaymentStatus {
    pub fn pending(method: PaymentMethod) -> Self {
        PaymentStatus::Pending { method }
    }

    pub fn confirmed(method: PaymentMethod, reference: impl Into<String>) -> Self {
        PaymentStatus::Confirmed {
            method,
            reference: reference.into(),
        }
    }

    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentStatus::Pending { method } | PaymentStatus::Confirmed { method, .. } => *method,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed { .. })
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            PaymentStatus::Confirmed { reference, .. } => Some(reference),
            PaymentStatus::Pending { .. } => None,
        }
    }
}
