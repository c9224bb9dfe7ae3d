//! Staff fulfilment transitions.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::AggregateId;
use domain::{AdvanceFulfillment, FulfillmentStep, OrderStatus};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::extract::StaffAccess;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StepParams {
    pub tracking_number: Option<String>,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub order_id: AggregateId,
    pub status: OrderStatus,
    /// False when the order already had the target status.
    pub applied: bool,
}

/// POST /fulfillment/orders/{id}/{step}
#[tracing::instrument(skip(state, _staff))]
pub async fn advance<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _staff: StaffAccess,
    Path((id, step)): Path<(String, String)>,
    Query(params): Query<StepParams>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let step = match step
        .parse::<FulfillmentStep>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        FulfillmentStep::Ship { .. } => FulfillmentStep::Ship {
            tracking_number: params.tracking_number,
        },
        other => other,
    };

    let result = state
        .orders
        .advance(AdvanceFulfillment::new(order_id, step))
        .await?;

    Ok(Json(TransitionResponse {
        order_id,
        status: result.aggregate.status(),
        applied: !result.is_noop(),
    }))
}
