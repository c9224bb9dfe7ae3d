//! Direct card checkout: charge first, then place the order.
//!
//! The order is placed only from the cart version that was priced for the
//! charge. A charge that cannot be turned into an order is refunded before
//! the checkout error is returned.

use std::sync::Arc;
use std::time::Instant;

use common::AggregateId;
use domain::{
    CheckoutReceipt, CheckoutRequest, CheckoutService, DomainError, PaymentMethod, PaymentStatus,
    UserId,
};
use event_store::EventStore;
use uuid::Uuid;

use crate::error::Result;
use crate::payment::{ChargeRequest, PaymentGateway};

pub struct CardCheckout<S: EventStore> {
    checkout: CheckoutService<S>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl<S: EventStore + Clone> CardCheckout<S> {
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>, currency: &str) -> Self {
        Self {
            checkout: CheckoutService::new(store),
            gateway,
            currency: currency.to_string(),
        }
    }

    #[tracing::instrument(skip(self, card_token))]
    pub async fn checkout_with_card(
        &self,
        user_id: UserId,
        cart_id: AggregateId,
        card_token: &str,
    ) -> Result<CheckoutReceipt> {
        let started = Instant::now();
        let result = self.charge_and_place(user_id, cart_id, card_token).await;

        let outcome = if result.is_ok() { "placed" } else { "failed" };
        metrics::histogram!("card_checkout_duration_seconds", "outcome" => outcome)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn charge_and_place(
        &self,
        user_id: UserId,
        cart_id: AggregateId,
        card_token: &str,
    ) -> Result<CheckoutReceipt> {
        let preview = self.checkout.preview(user_id, cart_id).await?;
        if let Some(blocker) = preview.blocker() {
            return Err(DomainError::from(blocker).into());
        }

        let receipt = self
            .gateway
            .charge(ChargeRequest {
                reference: format!("chk_{}", Uuid::new_v4().simple()),
                amount: preview.total,
                currency: self.currency.clone(),
                token: card_token.to_string(),
            })
            .await?;
        tracing::info!(charge_id = %receipt.charge_id, amount = %receipt.amount, "card charged");

        let placed = self
            .checkout
            .checkout(CheckoutRequest {
                user_id,
                cart_id,
                payment: PaymentStatus::confirmed(PaymentMethod::Card, receipt.charge_id.clone()),
                expected_cart_version: Some(preview.cart_version),
            })
            .await;

        match placed {
            Ok(order) => Ok(order),
            Err(err) => {
                tracing::warn!(
                    charge_id = %receipt.charge_id,
                    error = %err,
                    "checkout failed after charge, refunding"
                );
                if let Err(refund_err) = self.gateway.refund(&receipt.charge_id).await {
                    tracing::error!(
                        charge_id = %receipt.charge_id,
                        error = %refund_err,
                        "refund after failed checkout did not go through"
                    );
                    metrics::counter!("card_refund_failures_total").increment(1);
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::payment::{ChargeReceipt, InMemoryPaymentGateway, PaymentError};
    use crate::test_support::{shop, shopper};
    use async_trait::async_trait;
    use domain::{
        Cart, CartService, CheckoutError, InMemoryCatalog, Money, OrderStatus, Product, ProductId,
        Variant,
    };
    use event_store::InMemoryEventStore;

    /// Grows the shopper's cart while the charge is in flight.
    struct CartGrowingGateway {
        inner: InMemoryPaymentGateway,
        carts: CartService<InMemoryEventStore>,
        user: UserId,
    }

    #[async_trait]
    impl PaymentGateway for CartGrowingGateway {
        async fn charge(
            &self,
            request: ChargeRequest,
        ) -> std::result::Result<ChargeReceipt, PaymentError> {
            self.carts
                .add_product(
                    self.user,
                    ProductId::new("CAP-01"),
                    Variant::new(None, Some("navy")),
                    5,
                )
                .await
                .unwrap();
            self.inner.charge(request).await
        }

        async fn refund(&self, charge_id: &str) -> std::result::Result<(), PaymentError> {
            self.inner.refund(charge_id).await
        }
    }

    #[tokio::test]
    async fn test_successful_card_checkout() {
        let shop = shop().await;
        let user = shopper(&shop).await;
        let gateway = InMemoryPaymentGateway::new();
        let cards = CardCheckout::new(shop.store.clone(), Arc::new(gateway.clone()), "USD");

        let receipt = cards
            .checkout_with_card(user, Cart::id_for(user), "tok_visa")
            .await
            .unwrap();

        let order = shop.orders.get_order(receipt.order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.is_paid());
        assert_eq!(order.payment().unwrap().method(), PaymentMethod::Card);
        assert_eq!(gateway.charge_count().await, 1);
        assert!(shop.carts.get_cart(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cart_change_during_charge_is_refunded() {
        let shop = shop().await;
        let user = shopper(&shop).await;
        let catalog = InMemoryCatalog::with_products([Product::new(
            "CAP-01",
            "Cap",
            Money::from_cents(1800),
        )
        .with_colors(&["navy"])])
        .await;
        let inner = InMemoryPaymentGateway::new();
        let gateway = CartGrowingGateway {
            inner: inner.clone(),
            carts: CartService::new(shop.store.clone(), Arc::new(catalog)),
            user,
        };
        let cards = CardCheckout::new(shop.store.clone(), Arc::new(gateway), "USD");

        let result = cards
            .checkout_with_card(user, Cart::id_for(user), "tok_visa")
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Domain(DomainError::Checkout(
                CheckoutError::CartChanged { .. }
            )))
        ));
        assert_eq!(inner.charge_count().await, 0);
        assert_eq!(inner.refunded().await, vec!["ch_000001".to_string()]);

        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.drained_count(), 0);
        assert_eq!(cart.total(), Money::from_cents(2 * 1200 + 5 * 1800));
    }

    #[tokio::test]
    async fn test_decline_leaves_cart_intact() {
        let shop = shop().await;
        let user = shopper(&shop).await;
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_decline(Some("do not honor")).await;
        let cards = CardCheckout::new(shop.store.clone(), Arc::new(gateway.clone()), "USD");

        let result = cards
            .checkout_with_card(user, Cart::id_for(user), "tok_visa")
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::PaymentDeclined { reason }) if reason == "do not honor"
        ));
        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.drained_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_address_charges_nothing() {
        let shop = shop().await;
        let user = UserId::new();
        shop.customers
            .register(user, "noaddr@example.com", "noaddr")
            .await
            .unwrap();
        shop.carts
            .add_product(
                user,
                domain::ProductId::new("MUG-01"),
                domain::Variant::default(),
                1,
            )
            .await
            .unwrap();
        let gateway = InMemoryPaymentGateway::new();
        let cards = CardCheckout::new(shop.store.clone(), Arc::new(gateway.clone()), "USD");

        let result = cards
            .checkout_with_card(user, Cart::id_for(user), "tok_visa")
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Domain(DomainError::Checkout(
                CheckoutError::MissingAddress
            )))
        ));
        assert_eq!(gateway.charge_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_checkout_refunds_charge() {
        let shop = shop().await;
        let user = shopper(&shop).await;
        let gateway = InMemoryPaymentGateway::new();
        let cards = CardCheckout::new(shop.store.clone(), Arc::new(gateway.clone()), "USD");

        // Two card checkouts racing on one cart place one order; a losing
        // charge, if taken, is refunded.
        let cart_id = Cart::id_for(user);
        let (a, b) = tokio::join!(
            cards.checkout_with_card(user, cart_id, "tok_a"),
            cards.checkout_with_card(user, cart_id, "tok_b"),
        );

        let placed = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(placed, 1);
        // Net of refunds, exactly one charge stands.
        assert_eq!(gateway.charge_count().await, 1);
        assert!(gateway.refunded().await.len() <= 1);
        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.drained_count(), 1);
    }

    #[tokio::test]
    async fn test_foreign_cart() {
        let shop = shop().await;
        let owner = shopper(&shop).await;
        let intruder = shopper(&shop).await;
        let gateway = InMemoryPaymentGateway::new();
        let cards = CardCheckout::new(shop.store.clone(), Arc::new(gateway.clone()), "USD");

        let result = cards
            .checkout_with_card(intruder, Cart::id_for(owner), "tok_visa")
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Domain(DomainError::Checkout(
                CheckoutError::CartNotFound
            )))
        ));
        assert_eq!(gateway.charge_count().await, 0);
    }
}
