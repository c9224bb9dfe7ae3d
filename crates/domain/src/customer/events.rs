//! Customer domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::UserId;

use super::{Address, Email};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CustomerEvent {
    CustomerRegistered(CustomerRegisteredData),
    /// Insert or replace by address ID.
    AddressSaved(AddressSavedData),
}

impl DomainEvent for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerRegistered(_) => "CustomerRegistered",
            CustomerEvent::AddressSaved(_) => "AddressSaved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRegisteredData {
    pub user_id: UserId,
    pub email: Email,
    pub username: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSavedData {
    pub address: Address,
    pub saved_at: DateTime<Utc>,
}
