//! Request extractors for caller identity and staff access.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::UserId;
use event_store::EventStore;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";
pub const FULFILLMENT_KEY_HEADER: &str = "x-fulfillment-key";

/// The signed-in shopper, taken from the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Sign in to continue".to_string()))?;
        let uuid = raw
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("Invalid {USER_HEADER} header")))?;
        Ok(CurrentUser(UserId::from_uuid(uuid)))
    }
}

/// Proof that the caller presented the configured fulfilment key.
#[derive(Debug, Clone, Copy)]
pub struct StaffAccess;

impl<S: EventStore + Clone + 'static> FromRequestParts<Arc<AppState<S>>> for StaffAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.fulfillment_key.as_ref() else {
            return Err(ApiError::Forbidden);
        };
        let presented = parts
            .headers
            .get(FULFILLMENT_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(key) if key == expected.expose_secret() => Ok(StaffAccess),
            _ => {
                tracing::warn!("fulfilment request with missing or wrong key");
                Err(ApiError::Forbidden)
            }
        }
    }
}
