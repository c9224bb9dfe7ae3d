//! HTTP handlers grouped by screen.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod confirm;
pub mod customers;
pub mod fulfillment;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;

use common::AggregateId;

use crate::error::ApiError;

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AggregateId::from(uuid))
}
