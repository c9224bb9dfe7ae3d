//! Customer aggregate implementation.

use chrono::Utc;
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{AddressId, UserId};

use super::{
    Address, CustomerError, CustomerEvent, Email, ValidationError,
    events::{AddressSavedData, CustomerRegisteredData},
};

/// A registered shopper and their address book.
///
/// The stream ID is the user's UUID. The most recently saved address is the
/// default shipping address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    user_id: Option<UserId>,
    email: Option<Email>,
    username: String,

    /// Ordered by last save; the default address is last.
    addresses: Vec<Address>,
}

impl Aggregate for Customer {
    type Event = CustomerEvent;
    type Error = CustomerError;

    fn aggregate_type() -> &'static str {
        "Customer"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CustomerEvent::CustomerRegistered(data) => {
                self.id = Some(Customer::id_for(data.user_id));
                self.user_id = Some(data.user_id);
                self.email = Some(data.email);
                self.username = data.username;
            }
            CustomerEvent::AddressSaved(data) => {
                self.addresses.retain(|a| a.id != data.address.id);
                self.addresses.push(data.address);
            }
        }
    }
}

// Query methods
impl Customer {
    pub const USERNAME_MIN: usize = 3;
    pub const USERNAME_MAX: usize = 32;

    pub fn id_for(user_id: UserId) -> AggregateId {
        AggregateId::from_uuid(user_id.as_uuid())
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn address(&self, address_id: AddressId) -> Option<&Address> {
        self.addresses.iter().find(|a| a.id == address_id)
    }

    pub fn default_address(&self) -> Option<&Address> {
        self.addresses.last()
    }
}

// Command methods (return events)
impl Customer {
    pub fn register(
        &self,
        user_id: UserId,
        email: &str,
        username: &str,
    ) -> Result<Vec<CustomerEvent>, CustomerError> {
        if self.is_registered() {
            return Err(CustomerError::AlreadyRegistered);
        }

        let email = Email::parse(email).map_err(ValidationError::from)?;
        let username = username.trim();
        let length = username.chars().count();
        if !(Self::USERNAME_MIN..=Self::USERNAME_MAX).contains(&length) {
            return Err(ValidationError::Username {
                min: Self::USERNAME_MIN,
                max: Self::USERNAME_MAX,
            }
            .into());
        }

        Ok(vec![CustomerEvent::CustomerRegistered(
            CustomerRegisteredData {
                user_id,
                email,
                username: username.to_string(),
                registered_at: Utc::now(),
            },
        )])
    }

    /// Saves `address`, replacing any address with the same ID, and makes it
    /// the default.
    pub fn save_address(&self, address: Address) -> Result<Vec<CustomerEvent>, CustomerError> {
        if !self.is_registered() {
            return Err(CustomerError::NotRegistered);
        }
        let address = address.validated()?;

        Ok(vec![CustomerEvent::AddressSaved(AddressSavedData {
            address,
            saved_at: Utc::now(),
        })])
    }
}
