//! Integration tests for the storefront domain.
//!
//! These drive the services end to end against the in-memory store: cart to
//! checkout to fulfilment, replay from the log, and concurrent writers.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    Actor, Address, AddressId, Aggregate, CancelOrder, Cart, CartService, CheckoutError,
    CheckoutRequest, CheckoutService, ConfirmPayment, CustomerService, DomainError, InMemoryCatalog,
    Money, Order, OrderError, OrderService, OrderStatus, PaymentMethod, PaymentStatus, Product,
    ProductId, UserId, Variant, VerifyOrder,
};
use event_store::{EventStore, InMemoryEventStore, Version};

struct Storefront {
    store: InMemoryEventStore,
    carts: CartService<InMemoryEventStore>,
    customers: CustomerService<InMemoryEventStore>,
    checkout: CheckoutService<InMemoryEventStore>,
    orders: OrderService<InMemoryEventStore>,
}

async fn storefront() -> Storefront {
    let store = InMemoryEventStore::new();
    let catalog = InMemoryCatalog::with_products([
        Product::new("MUG-01", "Mug", Money::from_cents(1200)),
        Product::new("TEE-01", "T-shirt", Money::from_cents(2500))
            .with_sizes(&["S", "M", "L"])
            .with_colors(&["black"]),
    ])
    .await;

    Storefront {
        carts: CartService::new(store.clone(), Arc::new(catalog)),
        customers: CustomerService::new(store.clone()),
        checkout: CheckoutService::new(store.clone()),
        orders: OrderService::new(store.clone()),
        store,
    }
}

fn address() -> Address {
    Address {
        id: AddressId::new(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        line1: "1 Harbor Way".into(),
        line2: Some("Suite 9".into()),
        city: "Arlington".into(),
        postcode: "22201".into(),
        country: "US".into(),
        phone: None,
    }
}

async fn shopper_with_cart(shop: &Storefront) -> UserId {
    let user = UserId::new();
    shop.customers
        .register(user, &format!("{user}@example.com"), "grace")
        .await
        .unwrap();
    shop.customers.save_address(user, address()).await.unwrap();
    shop.carts
        .add_product(
            user,
            ProductId::new("TEE-01"),
            Variant::new(Some("M"), Some("black")),
            2,
        )
        .await
        .unwrap();
    user
}

async fn place_order(shop: &Storefront, user: UserId, payment: PaymentStatus) -> AggregateId {
    shop.checkout
        .checkout(CheckoutRequest {
            user_id: user,
            cart_id: Cart::id_for(user),
            payment,
            expected_cart_version: None,
        })
        .await
        .unwrap()
        .order_id
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn gateway_payment_lifecycle() {
        let shop = storefront().await;
        let user = shopper_with_cart(&shop).await;
        let order_id =
            place_order(&shop, user, PaymentStatus::pending(PaymentMethod::RazorPay)).await;

        let result = shop
            .orders
            .verify(VerifyOrder::new(order_id, Actor::EmailLink))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Verified);

        let result = shop
            .orders
            .confirm_payment(ConfirmPayment::new(
                order_id,
                PaymentMethod::RazorPay,
                "pay_42",
                Actor::PaymentGateway,
            ))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::InTransit);

        shop.orders.deliver(order_id).await.unwrap();
        shop.orders.mark_returned(order_id).await.unwrap();
        let result = shop.orders.refund(order_id).await.unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::Refunded);
        // placed, verified, paid, in transit, delivered, returned, refunded
        assert_eq!(result.new_version, Version::new(7));
    }

    #[tokio::test]
    async fn card_payment_goes_straight_to_fulfillment_on_verify() {
        let shop = storefront().await;
        let user = shopper_with_cart(&shop).await;
        let order_id = place_order(
            &shop,
            user,
            PaymentStatus::confirmed(PaymentMethod::Card, "ch_1"),
        )
        .await;

        let result = shop
            .orders
            .verify(VerifyOrder::new(order_id, Actor::EmailLink))
            .await
            .unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::InTransit);
        assert_eq!(result.events.len(), 2);
    }

    #[tokio::test]
    async fn order_detail_follows_address_edits() {
        let shop = storefront().await;
        let user = UserId::new();
        shop.customers
            .register(user, "grace@example.com", "grace")
            .await
            .unwrap();
        let mut home = address();
        shop.customers.save_address(user, home.clone()).await.unwrap();
        shop.carts
            .add_product(user, ProductId::new("MUG-01"), Variant::default(), 1)
            .await
            .unwrap();
        let order_id =
            place_order(&shop, user, PaymentStatus::pending(PaymentMethod::RazorPay)).await;

        home.line1 = "2 Harbor Way".into();
        shop.customers.save_address(user, home).await.unwrap();

        let detail = shop.orders.get_order_detail(user, order_id).await.unwrap();
        assert_eq!(detail.shipping_address.unwrap().line1, "2 Harbor Way");
        assert_eq!(detail.order.items()[0].unit_price, Money::from_cents(1200));
    }

    #[tokio::test]
    async fn aggregate_reconstruction_from_events() {
        let shop = storefront().await;
        let user = shopper_with_cart(&shop).await;
        let order_id =
            place_order(&shop, user, PaymentStatus::pending(PaymentMethod::RazorPay)).await;
        shop.orders
            .cancel(CancelOrder::new(order_id, Actor::EmailLink, None))
            .await
            .unwrap();

        let events = shop.store.get_events_for_aggregate(order_id).await.unwrap();
        assert_eq!(events.len(), 2);

        let mut order = Order::default();
        for envelope in events {
            order.apply(serde_json::from_value(envelope.payload).unwrap());
            order.set_version(envelope.version);
        }
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.total_price(), Money::from_cents(5000));
        assert_eq!(order.version(), Version::new(2));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn racing_checkouts_place_exactly_one_order() {
        let shop = Arc::new(storefront().await);
        let user = shopper_with_cart(&shop).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let shop = shop.clone();
            handles.push(tokio::spawn(async move {
                shop.checkout
                    .checkout(CheckoutRequest {
                        user_id: user,
                        cart_id: Cart::id_for(user),
                        payment: PaymentStatus::pending(PaymentMethod::RazorPay),
                        expected_cart_version: None,
                    })
                    .await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(DomainError::Checkout(CheckoutError::EmptyCart)) => {}
                Err(DomainError::EventStore(err)) if err.is_conflict() => {}
                Err(other) => panic!("unexpected checkout error: {other}"),
            }
        }
        assert_eq!(placed, 1);
        assert!(shop.carts.get_cart(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_and_cancel_race_leaves_one_outcome() {
        let shop = Arc::new(storefront().await);
        let user = shopper_with_cart(&shop).await;
        let order_id =
            place_order(&shop, user, PaymentStatus::pending(PaymentMethod::RazorPay)).await;

        let verifier = {
            let shop = shop.clone();
            tokio::spawn(async move {
                shop.orders
                    .verify(VerifyOrder::new(order_id, Actor::EmailLink))
                    .await
            })
        };
        let canceller = {
            let shop = shop.clone();
            tokio::spawn(async move {
                shop.orders
                    .cancel(CancelOrder::new(order_id, Actor::EmailLink, None))
                    .await
            })
        };
        let verified = verifier.await.unwrap();
        let cancelled = canceller.await.unwrap();

        let order = shop.orders.get_order(order_id).await.unwrap().unwrap();
        // Cancel is legal from both Pending and Verified.
        assert!(cancelled.is_ok());
        assert_eq!(order.status(), OrderStatus::Cancelled);
        match verified {
            Ok(result) => assert!(result.new_version <= order.version()),
            Err(err) => assert!(err.is_conflict()),
        }
    }
}

mod error_handling {
    use super::*;

    #[tokio::test]
    async fn cannot_cancel_after_fulfillment_started() {
        let shop = storefront().await;
        let user = shopper_with_cart(&shop).await;
        let order_id = place_order(
            &shop,
            user,
            PaymentStatus::confirmed(PaymentMethod::Card, "ch_1"),
        )
        .await;
        shop.orders
            .verify(VerifyOrder::new(order_id, Actor::EmailLink))
            .await
            .unwrap();

        let err = shop
            .orders
            .cancel(CancelOrder::new(order_id, Actor::EmailLink, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition {
                from: OrderStatus::InTransit,
                to: OrderStatus::Cancelled,
            })
        ));
    }

    #[tokio::test]
    async fn unpaid_order_cannot_be_delivered() {
        let shop = storefront().await;
        let user = shopper_with_cart(&shop).await;
        let order_id =
            place_order(&shop, user, PaymentStatus::pending(PaymentMethod::RazorPay)).await;

        let err = shop.orders.deliver(order_id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition { .. })
        ));

        shop.orders
            .verify(VerifyOrder::new(order_id, Actor::EmailLink))
            .await
            .unwrap();
        let err = shop.orders.ship(order_id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition {
                from: OrderStatus::Verified,
                to: OrderStatus::Shipped,
            })
        ));
    }

    #[tokio::test]
    async fn commands_on_unknown_order() {
        let shop = storefront().await;
        let err = shop
            .orders
            .verify(VerifyOrder::new(AggregateId::new(), Actor::EmailLink))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Order(OrderError::NotPlaced)));
    }
}
