//! Customer service: registration and the address book.

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, StreamAppend, Version};
use uuid::Uuid;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::value_objects::UserId;

use super::{Address, Customer, CustomerError, Email};

/// Namespace for email-claim stream IDs.
const EMAIL_CLAIM_NAMESPACE: Uuid = Uuid::from_u128(0x2b8e_51c4_7a0d_4f63_9e12_d4a7_06c3_b581);

pub struct CustomerService<S: EventStore> {
    handler: CommandHandler<S, Customer>,
}

impl<S: EventStore> CustomerService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Loads a registered customer.
    #[tracing::instrument(skip(self))]
    pub async fn get_customer(&self, user_id: UserId) -> Result<Customer, DomainError> {
        self.handler
            .load_existing(Customer::id_for(user_id))
            .await?
            .ok_or_else(|| CustomerError::NotRegistered.into())
    }

    /// Registers `user_id`.
    ///
    /// The customer stream and a claim stream keyed by the normalized email
    /// are created in one append, so two users can never hold the same
    /// address.
    #[tracing::instrument(skip(self))]
    pub async fn register(
        &self,
        user_id: UserId,
        email: &str,
        username: &str,
    ) -> Result<CommandResult<Customer>, DomainError> {
        let customer_id = Customer::id_for(user_id);
        let customer = self.handler.load(customer_id).await?;
        let events = customer.register(user_id, email, username)?;

        let prepared = self.handler.prepare(customer, customer_id, events, None)?;
        let claim = match prepared.aggregate.email() {
            Some(email) => email_claim(email, user_id)?,
            None => return Err(CustomerError::NotRegistered.into()),
        };

        let outcome = self
            .handler
            .store()
            .append_streams(vec![prepared.append.clone(), claim])
            .await;

        match outcome {
            Ok(versions) => {
                let version = versions.first().copied().unwrap_or_else(Version::first);
                tracing::info!(%user_id, "customer registered");
                Ok(prepared.committed(version))
            }
            Err(err) if err.is_conflict() => {
                let current = self.handler.load(customer_id).await?;
                if current.is_registered() {
                    Err(CustomerError::AlreadyRegistered.into())
                } else {
                    Err(CustomerError::EmailTaken.into())
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Saves an address and makes it the default shipping address.
    #[tracing::instrument(skip(self))]
    pub async fn save_address(
        &self,
        user_id: UserId,
        address: Address,
    ) -> Result<CommandResult<Customer>, DomainError> {
        self.handler
            .execute(Customer::id_for(user_id), |customer| {
                customer.save_address(address)
            })
            .await
    }
}

fn email_claim(email: &Email, user_id: UserId) -> Result<StreamAppend, DomainError> {
    let normalized = email.normalized();
    let envelope = EventEnvelope::builder()
        .aggregate_id(AggregateId::derived(
            EMAIL_CLAIM_NAMESPACE,
            normalized.as_bytes(),
        ))
        .aggregate_type("EmailClaim")
        .event_type("EmailClaimed")
        .version(Version::first())
        .payload(&serde_json::json!({ "email": normalized, "user_id": user_id }))?
        .build()?;

    Ok(StreamAppend::new(vec![envelope], AppendOptions::expect_new()))
}
