//! Card charges, signed gateway callbacks and result reconciliation.

mod gateway;
mod reconcile;
mod signature;

pub use gateway::{
    ChargeReceipt, ChargeRequest, InMemoryPaymentGateway, PaymentError, PaymentGateway,
};
pub use reconcile::{GatewayOutcome, GatewayResult, PaymentReconciler, ReconcileOutcome};
pub use signature::{CallbackVerifier, SIGNATURE_HEADER, SignatureError};
