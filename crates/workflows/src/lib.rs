//! Workflows around the order engine.
//!
//! - Signed email links that verify or cancel an order
//! - A bounded mail outbox in front of a pluggable [`Mailer`]
//! - Signed payment gateway results reconciled into orders
//! - Direct card checkout with refund on failure

pub mod card_checkout;
pub mod confirmation;
pub mod error;
pub mod mail;
pub mod payment;
pub mod token;

#[cfg(test)]
mod test_support;

pub use card_checkout::CardCheckout;
pub use confirmation::{ConfirmationOutcome, ConfirmationService, MailRequest};
pub use error::WorkflowError;
pub use mail::{InMemoryMailer, LogMailer, MailError, MailOutbox, Mailer, OutboundEmail};
pub use payment::{
    CallbackVerifier, ChargeReceipt, ChargeRequest, GatewayOutcome, GatewayResult,
    InMemoryPaymentGateway, PaymentError, PaymentGateway, PaymentReconciler, ReconcileOutcome,
    SIGNATURE_HEADER, SignatureError,
};
pub use token::{DEFAULT_TOKEN_TTL_HOURS, TokenAction, TokenClaims, TokenError, TokenSigner};
