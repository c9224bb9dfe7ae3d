//! Shopping cart aggregate.
//!
//! Each user owns exactly one cart stream, addressed by [`Cart::id_for`].
//! The stream is never deleted: checkout drains it and the user keeps
//! shopping on the same stream.

mod aggregate;
mod events;
mod service;

pub use aggregate::{Cart, CartLine, MAX_LINE_QUANTITY};
pub use events::{
    CartDrainedData, CartEvent, CartItemAddedData, CartItemQuantityUpdatedData,
    CartItemRemovedData, CartOpenedData,
};
pub use service::CartService;

use thiserror::Error;

use crate::value_objects::{ProductId, Variant};

/// Errors raised by cart commands.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Invalid quantity: {quantity} (must be between 1 and 999)")]
    InvalidQuantity { quantity: u32 },

    #[error("Invalid price: {cents} cents (must be greater than 0)")]
    InvalidPrice { cents: i64 },

    #[error("Item not in cart: {product_id} ({variant})")]
    ItemNotFound {
        product_id: ProductId,
        variant: Variant,
    },

    #[error("Product is not available: {0}")]
    ProductUnavailable(ProductId),

    #[error("Variant {variant} is not offered for product {product_id}")]
    InvalidVariant {
        product_id: ProductId,
        variant: Variant,
    },

    #[error("Cart is empty")]
    Empty,

    #[error("Cart has not been opened")]
    NotOpened,
}
