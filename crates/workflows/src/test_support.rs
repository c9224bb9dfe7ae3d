//! Shared fixtures for workflow unit tests.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    Address, AddressId, Cart, CartService, CheckoutRequest, CheckoutService, CustomerService,
    InMemoryCatalog, Money, OrderService, PaymentMethod, PaymentStatus, Product, ProductId,
    UserId, Variant,
};
use event_store::InMemoryEventStore;

pub(crate) struct Shop {
    pub store: InMemoryEventStore,
    pub carts: CartService<InMemoryEventStore>,
    pub customers: CustomerService<InMemoryEventStore>,
    pub checkout: CheckoutService<InMemoryEventStore>,
    pub orders: OrderService<InMemoryEventStore>,
}

pub(crate) async fn shop() -> Shop {
    let store = InMemoryEventStore::new();
    let catalog = InMemoryCatalog::with_products([
        Product::new("MUG-01", "Mug", Money::from_cents(1200)),
        Product::new("CAP-01", "Cap", Money::from_cents(1800)).with_colors(&["navy"]),
    ])
    .await;

    Shop {
        carts: CartService::new(store.clone(), Arc::new(catalog)),
        customers: CustomerService::new(store.clone()),
        checkout: CheckoutService::new(store.clone()),
        orders: OrderService::new(store.clone()),
        store,
    }
}

pub(crate) fn address(first_name: &str) -> Address {
    Address {
        id: AddressId::new(),
        first_name: first_name.to_string(),
        last_name: "Lamarr".to_string(),
        line1: "4 Frequency Lane".to_string(),
        line2: None,
        city: "Vienna".to_string(),
        postcode: "1010".to_string(),
        country: "AT".to_string(),
        phone: None,
    }
}

/// A registered user with an address and two mugs in the cart.
pub(crate) async fn shopper(shop: &Shop) -> UserId {
    let user = UserId::new();
    shop.customers
        .register(user, &format!("{user}@example.com"), "hedy")
        .await
        .unwrap();
    shop.customers
        .save_address(user, address("Hedy"))
        .await
        .unwrap();
    shop.carts
        .add_product(user, ProductId::new("MUG-01"), Variant::default(), 2)
        .await
        .unwrap();
    user
}

pub(crate) async fn placed_order(shop: &Shop) -> (UserId, AggregateId) {
    let user = shopper(shop).await;
    let receipt = shop
        .checkout
        .checkout(CheckoutRequest {
            user_id: user,
            cart_id: Cart::id_for(user),
            payment: PaymentStatus::pending(PaymentMethod::RazorPay),
            expected_cart_version: None,
        })
        .await
        .unwrap();
    (user, receipt.order_id)
}
