//! Gateway callbacks.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use event_store::EventStore;
use serde::Deserialize;
use workflows::{GatewayResult, ReconcileOutcome, SIGNATURE_HEADER};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CallbackRequest {
    pub order_id: String,
    #[serde(flatten)]
    pub result: GatewayResult,
}

/// POST /payments/callback: apply a signed gateway result to its order.
#[tracing::instrument(skip_all)]
pub async fn callback<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(err) = state.callback_verifier.verify(&body, signature) {
        tracing::warn!(error = %err, "rejected payment callback");
        metrics::counter!("payment_callback_rejections_total").increment(1);
        return Err(ApiError::Unauthorized(err.to_string()));
    }

    let req: CallbackRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid callback body: {e}")))?;
    let order_id = parse_aggregate_id(&req.order_id)?;
    let outcome = state.reconciler.reconcile(order_id, req.result).await?;
    Ok(Json(outcome))
}
