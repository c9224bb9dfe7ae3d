//! Landing endpoints for the links in confirmation emails.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use domain::OrderStatus;
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use workflows::ConfirmationOutcome;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TokenParams {
    pub token: String,
}

#[derive(Serialize)]
pub struct ConfirmationResponse {
    #[serde(flatten)]
    pub outcome: ConfirmationOutcome,
    pub redirect: &'static str,
}

/// GET /confirm/verify?token=
#[tracing::instrument(skip(state, params))]
pub async fn verify<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<TokenParams>,
) -> Result<Json<ConfirmationResponse>, ApiError> {
    let outcome = state
        .confirmations
        .confirm_verification(user_id, &params.token)
        .await?;

    // A freshly verified, unpaid order goes on to payment.
    let redirect = if outcome.status == OrderStatus::Verified {
        "payment"
    } else {
        "order"
    };
    Ok(Json(ConfirmationResponse { outcome, redirect }))
}

/// GET /confirm/cancel?token=
#[tracing::instrument(skip(state, params))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<TokenParams>,
) -> Result<Json<ConfirmationResponse>, ApiError> {
    let outcome = state
        .confirmations
        .confirm_cancellation(user_id, &params.token)
        .await?;
    Ok(Json(ConfirmationResponse {
        outcome,
        redirect: "orders",
    }))
}
