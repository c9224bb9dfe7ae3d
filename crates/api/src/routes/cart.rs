//! The shopper's cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::AggregateId;
use domain::{Cart, CartLine, Money, ProductId, Variant};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: AggregateId,
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub total: Money,
    pub checkout_eligible: bool,
}

impl CartResponse {
    fn new(cart_id: AggregateId, cart: &Cart) -> Self {
        Self {
            cart_id,
            lines: cart.lines().to_vec(),
            item_count: cart.item_count(),
            total: cart.total(),
            checkout_eligible: cart.is_checkout_eligible(),
        }
    }
}

#[derive(Deserialize)]
pub struct ItemRequest {
    pub product_id: String,
    pub size: Option<String>,
    pub color: Option<String>,
    /// Ignored on removal.
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

impl ItemRequest {
    fn variant(&self) -> Variant {
        Variant::new(self.size.as_deref(), self.color.as_deref())
    }
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(user_id).await?;
    Ok(Json(CartResponse::new(Cart::id_for(user_id), &cart)))
}

/// POST /cart/items: add a product at its catalog price.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<ItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let variant = req.variant();
    let result = state
        .carts
        .add_product(user_id, ProductId::new(req.product_id), variant, req.quantity)
        .await?;
    Ok(Json(CartResponse::new(Cart::id_for(user_id), &result.aggregate)))
}

/// PATCH /cart/items: set a line's quantity.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<ItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let variant = req.variant();
    let result = state
        .carts
        .update_item_quantity(user_id, ProductId::new(req.product_id), variant, req.quantity)
        .await?;
    Ok(Json(CartResponse::new(Cart::id_for(user_id), &result.aggregate)))
}

/// DELETE /cart/items: drop a line.
#[tracing::instrument(skip(state, req))]
pub async fn remove<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<ItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let variant = req.variant();
    let result = state
        .carts
        .remove_item(user_id, ProductId::new(req.product_id), variant)
        .await?;
    Ok(Json(CartResponse::new(Cart::id_for(user_id), &result.aggregate)))
}
