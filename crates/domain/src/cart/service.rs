//! Cart service: catalog lookups plus cart commands.

use std::sync::Arc;

use event_store::EventStore;

use crate::catalog::ProductCatalog;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::value_objects::{ProductId, UserId, Variant};

use super::{Cart, CartError, CartLine};

/// Operations on the current user's cart.
pub struct CartService<S: EventStore> {
    handler: CommandHandler<S, Cart>,
    catalog: Arc<dyn ProductCatalog>,
}

impl<S: EventStore> CartService<S> {
    pub fn new(store: S, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            catalog,
        }
    }

    /// Returns the user's cart; an untouched cart is empty.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.handler.load(Cart::id_for(user_id)).await
    }

    /// Adds a product at its current catalog price.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant: Variant,
        quantity: u32,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let product = match self.catalog.get_product(&product_id).await {
            Some(product) if product.active => product,
            _ => return Err(CartError::ProductUnavailable(product_id).into()),
        };
        if !product.offers(&variant) {
            return Err(CartError::InvalidVariant {
                product_id,
                variant,
            }
            .into());
        }

        let line = CartLine::new(product.id, product.name, variant, quantity, product.price);
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(user_id), |cart| cart.add_item(user_id, line))
            .await?;

        metrics::counter!("cart_items_added_total").increment(1);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant: Variant,
    ) -> Result<CommandResult<Cart>, DomainError> {
        self.handler
            .execute_with_snapshot(Cart::id_for(user_id), |cart| {
                cart.remove_item(product_id, variant)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant: Variant,
        quantity: u32,
    ) -> Result<CommandResult<Cart>, DomainError> {
        self.handler
            .execute_with_snapshot(Cart::id_for(user_id), |cart| {
                cart.update_item_quantity(product_id, variant, quantity)
            })
            .await
    }
}
