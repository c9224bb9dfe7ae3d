//! End-to-end buyer journeys through the workflow services.

use std::sync::Arc;

use chrono::Duration;
use common::AggregateId;
use domain::{
    Address, AddressId, Cart, CartService, CheckoutRequest, CheckoutService, CustomerService,
    InMemoryCatalog, Money, OrderService, OrderStatus, PaymentMethod, PaymentStatus, Product,
    ProductId, UserId, Variant,
};
use event_store::InMemoryEventStore;
use secrecy::SecretString;
use workflows::{
    CardCheckout, ConfirmationService, GatewayOutcome, GatewayResult, InMemoryMailer,
    InMemoryPaymentGateway, MailOutbox, OutboundEmail, PaymentReconciler, ReconcileOutcome,
    TokenSigner,
};

struct TestHarness {
    carts: CartService<InMemoryEventStore>,
    customers: CustomerService<InMemoryEventStore>,
    checkout: CheckoutService<InMemoryEventStore>,
    orders: OrderService<InMemoryEventStore>,
    confirmations: ConfirmationService<InMemoryEventStore>,
    reconciler: PaymentReconciler<InMemoryEventStore>,
    cards: CardCheckout<InMemoryEventStore>,
    mailer: InMemoryMailer,
    gateway: InMemoryPaymentGateway,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryEventStore::new();
        let catalog = InMemoryCatalog::with_products([
            Product::new("SCARF-01", "Scarf", Money::from_cents(3400))
                .with_colors(&["red", "grey"]),
        ])
        .await;
        let mailer = InMemoryMailer::new();
        let gateway = InMemoryPaymentGateway::new();
        let (outbox, _worker) = MailOutbox::spawn(Arc::new(mailer.clone()), 32);
        let signer = TokenSigner::new(
            SecretString::from("integration".to_string()),
            Duration::hours(48),
        );

        Self {
            carts: CartService::new(store.clone(), Arc::new(catalog)),
            customers: CustomerService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            confirmations: ConfirmationService::new(
                store.clone(),
                signer,
                outbox,
                "http://localhost:3000",
            ),
            reconciler: PaymentReconciler::new(store.clone()),
            cards: CardCheckout::new(store, Arc::new(gateway.clone()), "USD"),
            mailer,
            gateway,
        }
    }

    async fn shopper(&self) -> UserId {
        let user = UserId::new();
        self.customers
            .register(user, &format!("buyer-{user}@example.com"), "buyer")
            .await
            .unwrap();
        self.customers
            .save_address(
                user,
                Address {
                    id: AddressId::new(),
                    first_name: "Katherine".into(),
                    last_name: "Johnson".into(),
                    line1: "3 Orbit Street".into(),
                    line2: None,
                    city: "Hampton".into(),
                    postcode: "23666".into(),
                    country: "US".into(),
                    phone: Some("555-0100".into()),
                },
            )
            .await
            .unwrap();
        self.carts
            .add_product(
                user,
                ProductId::new("SCARF-01"),
                Variant::new(None, Some("red")),
                1,
            )
            .await
            .unwrap();
        user
    }

    async fn last_mail(&self, count: usize) -> OutboundEmail {
        self.mailer.wait_for_attempts(count).await;
        self.mailer.sent().await.pop().unwrap()
    }
}

fn token_from(email: &OutboundEmail) -> String {
    let start = email.html_body.find("token=").unwrap() + "token=".len();
    email.html_body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

#[tokio::test]
async fn test_gateway_journey_to_delivery() {
    let h = TestHarness::new().await;
    let user = h.shopper().await;

    let receipt = h
        .checkout
        .checkout(CheckoutRequest {
            user_id: user,
            cart_id: Cart::id_for(user),
            payment: PaymentStatus::pending(PaymentMethod::RazorPay),
            expected_cart_version: None,
        })
        .await
        .unwrap();
    let order_id = receipt.order_id;

    h.confirmations
        .request_verification(user, order_id)
        .await
        .unwrap();
    let mail = h.last_mail(1).await;
    assert!(mail.html_body.contains("Katherine"));

    let verified = h
        .confirmations
        .confirm_verification(user, &token_from(&mail))
        .await
        .unwrap();
    assert_eq!(verified.status, OrderStatus::Verified);

    let paid = h
        .reconciler
        .reconcile(
            order_id,
            GatewayResult {
                method: PaymentMethod::RazorPay,
                reference: "pay_777".into(),
                outcome: GatewayOutcome::Confirmed,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        paid,
        ReconcileOutcome::Applied {
            status: OrderStatus::InTransit
        }
    );

    h.orders.deliver(order_id).await.unwrap();
    let order = h.orders.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Delivered);
    assert_eq!(order.total_price(), Money::from_cents(3400));
}

#[tokio::test]
async fn test_card_journey_then_cancellation() {
    let h = TestHarness::new().await;
    let user = h.shopper().await;

    let receipt = h
        .cards
        .checkout_with_card(user, Cart::id_for(user), "tok_mastercard")
        .await
        .unwrap();
    assert_eq!(h.gateway.charge_count().await, 1);

    h.confirmations
        .request_cancellation(user, receipt.order_id)
        .await
        .unwrap();
    let mail = h.last_mail(1).await;
    assert_eq!(mail.subject, "Verify order cancellation");

    let cancelled = h
        .confirmations
        .confirm_cancellation(user, &token_from(&mail))
        .await
        .unwrap();
    assert!(cancelled.applied);
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // A replayed gateway confirmation for the cancelled order changes nothing.
    let charge_id = receipt
        .order
        .payment()
        .and_then(|payment| payment.reference())
        .unwrap()
        .to_string();
    let replay = h
        .reconciler
        .reconcile(
            receipt.order_id,
            GatewayResult {
                method: PaymentMethod::Card,
                reference: charge_id,
                outcome: GatewayOutcome::Confirmed,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        replay,
        ReconcileOutcome::Ignored {
            status: OrderStatus::Cancelled
        }
    );
}

#[tokio::test]
async fn test_mail_failure_does_not_touch_orders() {
    let h = TestHarness::new().await;
    let user = h.shopper().await;
    let receipt = h
        .checkout
        .checkout(CheckoutRequest {
            user_id: user,
            cart_id: Cart::id_for(user),
            payment: PaymentStatus::pending(PaymentMethod::RazorPay),
            expected_cart_version: None,
        })
        .await
        .unwrap();

    h.mailer.set_failing(true).await;
    let request = h
        .confirmations
        .request_verification(user, receipt.order_id)
        .await
        .unwrap();
    assert!(request.mail_queued);
    h.mailer.wait_for_attempts(1).await;

    assert!(h.mailer.sent().await.is_empty());
    let order = h.orders.get_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Pending);
}

#[tokio::test]
async fn test_unknown_order_everywhere() {
    let h = TestHarness::new().await;
    let user = h.shopper().await;
    let missing = AggregateId::new();

    assert!(matches!(
        h.confirmations.request_verification(user, missing).await,
        Err(workflows::WorkflowError::OrderNotFound)
    ));
    assert!(matches!(
        h.confirmations.request_cancellation(user, missing).await,
        Err(workflows::WorkflowError::OrderNotFound)
    ));
}
