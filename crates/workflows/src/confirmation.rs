//! Email-link confirmation of order verification and cancellation.
//!
//! Requesting a confirmation mails a signed link to the buyer and changes
//! nothing. Following the link applies the transition with actor
//! [`Actor::EmailLink`]; following it twice is a no-op.

use chrono::Utc;
use common::AggregateId;
use domain::{
    Actor, CancelOrder, CustomerError, CustomerService, DomainError, OrderError, OrderService,
    OrderStatus, UserId, VerifyOrder,
};
use event_store::EventStore;
use serde::Serialize;

use crate::error::Result;
use crate::mail::{MailOutbox, OutboundEmail, cancellation_email, verification_email};
use crate::token::{TokenAction, TokenSigner};

pub const VERIFIED_MESSAGE: &str = "Email successfully verified, you can pay now for your order";
pub const ALREADY_PROCESSED_MESSAGE: &str = "Order already processed";
pub const CANCELLED_MESSAGE: &str = "Order cancelled";
pub const ALREADY_CANCELLED_MESSAGE: &str = "Order already cancelled";

/// Result of following a confirmation link.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationOutcome {
    pub order_id: AggregateId,
    pub status: OrderStatus,
    /// False when the link had already been used.
    pub applied: bool,
    pub message: String,
}

/// Result of asking for a confirmation mail.
#[derive(Debug, Clone, Serialize)]
pub struct MailRequest {
    pub order_id: AggregateId,
    pub status: OrderStatus,
    pub mail_queued: bool,
    pub message: String,
}

pub struct ConfirmationService<S: EventStore> {
    orders: OrderService<S>,
    customers: CustomerService<S>,
    signer: TokenSigner,
    outbox: MailOutbox,
    base_url: String,
}

impl<S: EventStore + Clone> ConfirmationService<S> {
    pub fn new(store: S, signer: TokenSigner, outbox: MailOutbox, base_url: &str) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            customers: CustomerService::new(store),
            signer,
            outbox,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Mails a verification link for a pending order.
    #[tracing::instrument(skip(self))]
    pub async fn request_verification(
        &self,
        user_id: UserId,
        order_id: AggregateId,
    ) -> Result<MailRequest> {
        let order = self.orders.get_order_for(user_id, order_id).await?;
        if order.status() != OrderStatus::Pending {
            return Ok(MailRequest {
                order_id,
                status: order.status(),
                mail_queued: false,
                message: ALREADY_PROCESSED_MESSAGE.to_string(),
            });
        }

        let link = self.link("verify", order_id, TokenAction::VerifyOrder)?;
        let (to, first_name) = self.recipient(user_id, order_id).await?;
        let email = verification_email(&to, &first_name, &order, &link, self.ttl_hours())?;
        self.send(email, order_id, TokenAction::VerifyOrder)?;

        Ok(MailRequest {
            order_id,
            status: order.status(),
            mail_queued: true,
            message: "Verification email sent".to_string(),
        })
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn confirm_verification(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<ConfirmationOutcome> {
        let claims = self
            .signer
            .verify(token, TokenAction::VerifyOrder, Utc::now())?;
        self.orders.get_order_for(user_id, claims.order_id).await?;

        let result = self
            .orders
            .verify(VerifyOrder::new(claims.order_id, Actor::EmailLink))
            .await?;
        let applied = !result.is_noop();
        record(TokenAction::VerifyOrder, applied);

        Ok(ConfirmationOutcome {
            order_id: claims.order_id,
            status: result.aggregate.status(),
            applied,
            message: if applied {
                VERIFIED_MESSAGE
            } else {
                ALREADY_PROCESSED_MESSAGE
            }
            .to_string(),
        })
    }

    /// Mails a cancellation link.
    ///
    /// An order that is already cancelled gets no mail; one that can no
    /// longer be cancelled is refused up front.
    #[tracing::instrument(skip(self))]
    pub async fn request_cancellation(
        &self,
        user_id: UserId,
        order_id: AggregateId,
    ) -> Result<MailRequest> {
        let order = self.orders.get_order_for(user_id, order_id).await?;
        let status = order.status();
        if status == OrderStatus::Cancelled {
            return Ok(MailRequest {
                order_id,
                status,
                mail_queued: false,
                message: ALREADY_CANCELLED_MESSAGE.to_string(),
            });
        }
        if !status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition {
                from: status,
                to: OrderStatus::Cancelled,
            }
            .into());
        }

        let link = self.link("cancel", order_id, TokenAction::CancelOrder)?;
        let (to, first_name) = self.recipient(user_id, order_id).await?;
        let email = cancellation_email(&to, &first_name, &order, &link, self.ttl_hours())?;
        self.send(email, order_id, TokenAction::CancelOrder)?;

        Ok(MailRequest {
            order_id,
            status,
            mail_queued: true,
            message: "Cancellation email sent".to_string(),
        })
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn confirm_cancellation(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<ConfirmationOutcome> {
        let claims = self
            .signer
            .verify(token, TokenAction::CancelOrder, Utc::now())?;
        self.orders.get_order_for(user_id, claims.order_id).await?;

        let result = self
            .orders
            .cancel(CancelOrder::new(
                claims.order_id,
                Actor::EmailLink,
                Some("confirmed by email".to_string()),
            ))
            .await?;
        let applied = !result.is_noop();
        record(TokenAction::CancelOrder, applied);

        Ok(ConfirmationOutcome {
            order_id: claims.order_id,
            status: result.aggregate.status(),
            applied,
            message: if applied {
                CANCELLED_MESSAGE
            } else {
                ALREADY_CANCELLED_MESSAGE
            }
            .to_string(),
        })
    }

    fn link(&self, path: &str, order_id: AggregateId, action: TokenAction) -> Result<String> {
        let token = self.signer.sign(order_id, action, Utc::now())?;
        Ok(format!("{}/confirm/{path}?token={token}", self.base_url))
    }

    fn ttl_hours(&self) -> i64 {
        self.signer.ttl().num_hours()
    }

    /// Registered email of the buyer and the first name on the order's
    /// shipping address.
    async fn recipient(&self, user_id: UserId, order_id: AggregateId) -> Result<(String, String)> {
        let customer = self.customers.get_customer(user_id).await?;
        let Some(email) = customer.email() else {
            return Err(DomainError::from(CustomerError::NotRegistered).into());
        };
        let to = email.to_string();

        let detail = self.orders.get_order_detail(user_id, order_id).await?;
        let first_name = match detail.shipping_address {
            Some(address) => address.first_name,
            None => customer.username().to_string(),
        };
        Ok((to, first_name))
    }

    fn send(&self, email: OutboundEmail, order_id: AggregateId, action: TokenAction) -> Result<()> {
        self.outbox.enqueue(email)?;
        tracing::info!(%order_id, %action, "confirmation mail queued");
        Ok(())
    }
}

fn record(action: TokenAction, applied: bool) {
    let action = match action {
        TokenAction::VerifyOrder => "verify",
        TokenAction::CancelOrder => "cancel",
    };
    let applied = if applied { "true" } else { "false" };
    metrics::counter!("confirmations_total", "action" => action, "applied" => applied)
        .increment(1);
}
