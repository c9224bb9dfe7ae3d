//! Order listing, detail, history and confirmation-mail requests.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    Address, Aggregate, DomainError, Money, OrderError, OrderFilter, OrderItem, OrderStatus,
    PaymentStatus,
};
use event_store::EventStore;
use projections::{OrderSummary, OrderTimeline};
use serde::{Deserialize, Serialize};
use workflows::MailRequest;

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub filter: Option<String>,
}

/// The order verify/detail screen.
#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: AggregateId,
    pub status: OrderStatus,
    pub payment: Option<PaymentStatus>,
    pub items: Vec<OrderItem>,
    pub total_price: Money,
    pub placed_at: Option<DateTime<Utc>>,
    pub shipping_address: Option<Address>,
}

/// GET /orders?filter=recent|cancelled|in_transit
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let filter = params
        .filter
        .as_deref()
        .unwrap_or_default()
        .parse::<OrderFilter>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // Run catch-up to ensure the read model includes latest events
    state.projection_processor.run_catch_up().await?;

    Ok(Json(state.user_orders.list(user_id, filter).await))
}

/// GET /orders/{id}: items frozen at checkout, the current address.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let detail = state.orders.get_order_detail(user_id, order_id).await?;
    let order = detail.order;

    Ok(Json(OrderResponse {
        order_id: order.id().unwrap_or(order_id),
        status: order.status(),
        payment: order.payment().cloned(),
        items: order.items().to_vec(),
        total_price: order.total_price(),
        placed_at: order.placed_at(),
        shipping_address: detail.shipping_address,
    }))
}

/// GET /orders/{id}/history: status timeline.
#[tracing::instrument(skip(state))]
pub async fn history<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderTimeline>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    state.projection_processor.run_catch_up().await?;

    state
        .order_history
        .timeline_for(user_id, order_id)
        .await
        .map(Json)
        .ok_or_else(|| DomainError::from(OrderError::NotPlaced).into())
}

/// POST /orders/{id}/verification-email
#[tracing::instrument(skip(state))]
pub async fn request_verification<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<MailRequest>), ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let request = state
        .confirmations
        .request_verification(user_id, order_id)
        .await?;
    Ok((mail_status(&request), Json(request)))
}

/// POST /orders/{id}/cancellation
#[tracing::instrument(skip(state))]
pub async fn request_cancellation<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<MailRequest>), ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let request = state
        .confirmations
        .request_cancellation(user_id, order_id)
        .await?;
    Ok((mail_status(&request), Json(request)))
}

fn mail_status(request: &MailRequest) -> StatusCode {
    if request.mail_queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    }
}
