//! Registration and the address book.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::{Address, AddressId, CustomerError, DomainError, UserId};
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
}

#[derive(Deserialize)]
pub struct AddressRequest {
    /// Existing address to overwrite; a new one is created when absent.
    pub id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postcode: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<AddressRequest> for Address {
    fn from(req: AddressRequest) -> Self {
        Address {
            id: req.id.map(AddressId::from_uuid).unwrap_or_default(),
            first_name: req.first_name,
            last_name: req.last_name,
            line1: req.line1,
            line2: req.line2,
            city: req.city,
            postcode: req.postcode,
            country: req.country,
            phone: req.phone,
        }
    }
}

/// POST /customers: register the current user.
#[tracing::instrument(skip(state, req))]
pub async fn register<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let result = state
        .customers
        .register(user_id, &req.email, &req.username)
        .await?;
    let customer = result.aggregate;

    Ok((
        StatusCode::CREATED,
        Json(CustomerResponse {
            user_id,
            email: customer
                .email()
                .map(ToString::to_string)
                .unwrap_or_default(),
            username: customer.username().to_string(),
        }),
    ))
}

/// PUT /customers/me/address: save an address and make it the default.
#[tracing::instrument(skip(state, req))]
pub async fn save_address<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<AddressRequest>,
) -> Result<Json<Address>, ApiError> {
    let address: Address = req.into();
    let address_id = address.id;
    let result = state.customers.save_address(user_id, address).await?;

    let saved = result
        .aggregate
        .address(address_id)
        .cloned()
        .ok_or(CustomerError::NotRegistered)
        .map_err(DomainError::from)?;
    Ok(Json(saved))
}
