//! Customer registration and address book.
//!
//! Login, passwords and sessions live outside this crate; callers supply
//! an already authenticated [`UserId`](crate::value_objects::UserId).

mod address;
mod aggregate;
mod email;
mod events;
mod service;

pub use address::Address;
pub use aggregate::Customer;
pub use email::{Email, EmailError};
pub use events::{AddressSavedData, CustomerEvent, CustomerRegisteredData};
pub use service::CustomerService;

use thiserror::Error;

/// Input that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("username must be {min}-{max} characters")]
    Username { min: usize, max: usize },

    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Errors raised by customer commands.
#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("Customer is not registered")]
    NotRegistered,

    #[error("Customer is already registered")]
    AlreadyRegistered,

    #[error("Email address is already in use")]
    EmailTaken,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}
