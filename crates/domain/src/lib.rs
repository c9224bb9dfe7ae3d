//! Domain layer for the storefront.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler for load/decide/append with conflict retry
//! - Cart, Order and Customer aggregates
//! - CheckoutService, committing order placement and cart drain atomically
//! - The ProductCatalog capability

pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod command;
pub mod customer;
pub mod error;
pub mod order;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use cart::{Cart, CartError, CartEvent, CartLine, CartService};
pub use catalog::{InMemoryCatalog, Product, ProductCatalog};
pub use checkout::{
    CheckoutError, CheckoutPreview, CheckoutReceipt, CheckoutRequest, CheckoutService,
};
pub use command::{
    Command, CommandHandler, CommandResult, DEFAULT_COMMAND_ATTEMPTS, PreparedCommand,
};
pub use customer::{
    Address, Customer, CustomerError, CustomerEvent, CustomerService, Email, ValidationError,
};
pub use error::DomainError;
pub use order::{
    Actor, AdvanceFulfillment, CancelOrder, ConfirmPayment, FulfillmentStep, Order, OrderDetail,
    OrderError, OrderEvent, OrderFilter, OrderItem, OrderService, OrderStatus, PaymentMethod,
    PaymentStatus, VerifyOrder,
};
pub use value_objects::{AddressId, Money, ProductId, UserId, Variant};
