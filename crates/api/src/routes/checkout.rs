//! Checkout screen and order placement.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{CheckoutPreview, CheckoutReceipt, CheckoutRequest, PaymentMethod, PaymentStatus};
use event_store::{EventStore, Version};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub cart_id: String,
    /// Redirect-based gateway chosen on the checkout screen.
    #[serde(default = "default_method")]
    pub payment_method: PaymentMethod,
    /// `cart_version` from the preview the shopper confirmed.
    #[serde(default)]
    pub cart_version: Option<Version>,
}

fn default_method() -> PaymentMethod {
    PaymentMethod::RazorPay
}

#[derive(Deserialize)]
pub struct CardCheckoutRequest {
    pub cart_id: String,
    pub card_token: String,
}

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: AggregateId,
    pub redirect: &'static str,
    pub message: &'static str,
}

impl OrderPlacedResponse {
    fn from_receipt(receipt: &CheckoutReceipt, message: &'static str) -> Self {
        Self {
            order_id: receipt.order_id,
            redirect: "order",
            message,
        }
    }
}

/// GET /checkout/{cart_id}: what checkout would place. Changes nothing.
#[tracing::instrument(skip(state))]
pub async fn preview<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(cart_id): Path<String>,
) -> Result<Json<CheckoutPreview>, ApiError> {
    let cart_id = parse_aggregate_id(&cart_id)?;
    let preview = state.checkout.preview(user_id, cart_id).await?;
    Ok(Json(preview))
}

/// POST /checkout: place an order paid later through the gateway.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    if req.payment_method == PaymentMethod::Card {
        return Err(ApiError::BadRequest(
            "Card payments go through /checkout/card".to_string(),
        ));
    }
    let cart_id = parse_aggregate_id(&req.cart_id)?;

    let receipt = state
        .checkout
        .checkout(CheckoutRequest {
            user_id,
            cart_id,
            payment: PaymentStatus::pending(req.payment_method),
            expected_cart_version: req.cart_version,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse::from_receipt(&receipt, "Order placed")),
    ))
}

/// POST /checkout/card: charge the card, then place the order.
#[tracing::instrument(skip(state, req))]
pub async fn place_with_card<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CardCheckoutRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let cart_id = parse_aggregate_id(&req.cart_id)?;
    let receipt = state
        .cards
        .checkout_with_card(user_id, cart_id, &req.card_token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse::from_receipt(
            &receipt,
            "Payment received, order placed",
        )),
    ))
}
