//! Checkout: turns a cart into an order in one atomic commit.
//!
//! The new order stream (`OrderPlaced`, expected to be new) and the cart
//! stream (`CartDrained`, expected at the version checkout read) are written
//! by a single [`EventStore::append_streams`] call. Either both land or
//! neither does; a lost race is retried from a fresh read.

use common::AggregateId;
use event_store::{EventStore, EventStoreError, Version};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::cart::{Cart, CartLine};
use crate::command::{CommandHandler, DEFAULT_COMMAND_ATTEMPTS};
use crate::customer::{Address, Customer};
use crate::error::DomainError;
use crate::order::{Order, OrderItem, PaymentStatus};
use crate::value_objects::{Money, UserId};

/// Errors raised by checkout before anything is written.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Unknown cart, or a cart that belongs to another user.
    #[error("Cart not found")]
    CartNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Kindly fill in an address before checking out")]
    MissingAddress,

    /// The cart moved past the version the caller priced.
    #[error("Your cart changed during checkout, please review it")]
    CartChanged { expected: Version, actual: Version },
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub cart_id: AggregateId,

    /// Payment chosen on the checkout screen; confirmed when the card was
    /// charged up front.
    pub payment: PaymentStatus,

    /// Cart version the caller priced, when a charge was taken against it.
    /// Checkout refuses a cart at any other version.
    pub expected_cart_version: Option<Version>,
}

/// What the checkout screen shows. Reading it changes nothing.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutPreview {
    pub cart_id: AggregateId,
    pub cart_version: Version,
    pub lines: Vec<CartLine>,
    pub total: Money,
    pub address: Option<Address>,
    pub eligible: bool,
}

impl CheckoutPreview {
    /// The first reason checkout would refuse, if any.
    pub fn blocker(&self) -> Option<CheckoutError> {
        if !self.eligible {
            Some(CheckoutError::EmptyCart)
        } else if self.address.is_none() {
            Some(CheckoutError::MissingAddress)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order_id: AggregateId,
    pub order: Order,
    pub cart_version: Version,

    /// Stamped on both streams' events.
    pub correlation_id: Uuid,
}

pub struct CheckoutService<S: EventStore> {
    carts: CommandHandler<S, Cart>,
    orders: CommandHandler<S, Order>,
    customers: CommandHandler<S, Customer>,
}

impl<S: EventStore + Clone> CheckoutService<S> {
    pub fn new(store: S) -> Self {
        Self {
            carts: CommandHandler::new(store.clone()),
            orders: CommandHandler::new(store.clone()),
            customers: CommandHandler::new(store),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn preview(
        &self,
        user_id: UserId,
        cart_id: AggregateId,
    ) -> Result<CheckoutPreview, DomainError> {
        let cart = self.owned_cart(user_id, cart_id).await?;
        let customer = self.customers.load(Customer::id_for(user_id)).await?;

        Ok(CheckoutPreview {
            cart_id,
            cart_version: cart.version(),
            lines: cart.lines().to_vec(),
            total: cart.total(),
            address: customer.default_address().cloned(),
            eligible: cart.is_checkout_eligible(),
        })
    }

    /// Places an order from the user's cart and drains the cart.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, DomainError> {
        let correlation_id = Uuid::new_v4();
        let mut attempt = 1;
        let outcome = loop {
            match self.try_checkout(&request, correlation_id).await {
                Err(err) if err.is_conflict() && attempt < DEFAULT_COMMAND_ATTEMPTS => {
                    tracing::warn!(attempt, "checkout raced another writer, retrying");
                    metrics::counter!("command_retries_total", "aggregate" => "Checkout")
                        .increment(1);
                    attempt += 1;
                }
                other => break other,
            }
        };

        match &outcome {
            Ok(receipt) => {
                tracing::info!(
                    order_id = %receipt.order_id,
                    total = %receipt.order.total_price(),
                    %correlation_id,
                    "order placed"
                );
                metrics::counter!("checkout_total").increment(1);
            }
            Err(err) => {
                tracing::warn!(error = %err, "checkout failed");
                metrics::counter!("checkout_failures_total").increment(1);
            }
        }
        outcome
    }

    async fn try_checkout(
        &self,
        request: &CheckoutRequest,
        correlation_id: Uuid,
    ) -> Result<CheckoutReceipt, DomainError> {
        let cart_id = request.cart_id;
        let cart = self.owned_cart(request.user_id, cart_id).await?;
        let priced = request.expected_cart_version;
        if let Some(expected) = priced.filter(|version| *version != cart.version()) {
            return Err(CheckoutError::CartChanged {
                expected,
                actual: cart.version(),
            }
            .into());
        }
        if !cart.is_checkout_eligible() {
            return Err(CheckoutError::EmptyCart.into());
        }

        let customer = self.customers.load(Customer::id_for(request.user_id)).await?;
        let address_id = customer
            .default_address()
            .map(|address| address.id)
            .ok_or(CheckoutError::MissingAddress)?;

        let order_id = AggregateId::new();
        let items = cart.lines().iter().map(OrderItem::from).collect();
        let order = Order::default();
        let order_events = order.place(
            order_id,
            request.user_id,
            cart_id,
            address_id,
            items,
            request.payment.clone(),
        )?;
        let cart_events = cart.drain(order_id)?;

        let order = self
            .orders
            .prepare(order, order_id, order_events, Some(correlation_id))?;
        let cart = self
            .carts
            .prepare(cart, cart_id, cart_events, Some(correlation_id))?;

        let versions = self
            .carts
            .store()
            .append_streams(vec![order.append.clone(), cart.append.clone()])
            .await?;
        let [order_version, cart_version] = versions.as_slice() else {
            return Err(EventStoreError::InvalidAppend(format!(
                "expected versions for 2 streams, got {}",
                versions.len()
            ))
            .into());
        };
        let (order_version, cart_version) = (*order_version, *cart_version);

        let cart = cart.committed(cart_version);
        self.carts.snapshot_if_due(cart_id, &cart).await?;

        Ok(CheckoutReceipt {
            order_id,
            order: order.committed(order_version).aggregate,
            cart_version,
            correlation_id,
        })
    }

    /// Loads the cart if `cart_id` is the user's own cart.
    async fn owned_cart(&self, user_id: UserId, cart_id: AggregateId) -> Result<Cart, DomainError> {
        if cart_id != Cart::id_for(user_id) {
            return Err(CheckoutError::CartNotFound.into());
        }
        let cart = self.carts.load(cart_id).await?;
        if cart.id().is_some() && !cart.is_owned_by(user_id) {
            return Err(CheckoutError::CartNotFound.into());
        }
        Ok(cart)
    }
}
