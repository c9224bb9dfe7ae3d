//! API error types with HTTP response mapping.
//!
//! Bodies are `{"error": message}` plus, where the shopper should be sent
//! somewhere else, a `redirect` naming that screen. Internal failures are
//! logged in full and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, CheckoutError, CustomerError, DomainError, OrderError};
use projections::ProjectionError;
use serde::Serialize;
use workflows::{PaymentError, WorkflowError};

pub const GENERIC_MESSAGE: &str = "Something went wrong, try again later";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid identity header.
    Unauthorized(String),
    /// Staff route called without the right key.
    Forbidden,
    /// Bad request from the client.
    BadRequest(String),
    Domain(DomainError),
    Workflow(WorkflowError),
    Projection(ProjectionError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'static str>,
}

struct Mapped {
    status: StatusCode,
    message: String,
    redirect: Option<&'static str>,
}

impl Mapped {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            redirect: None,
        }
    }

    fn redirect(mut self, screen: &'static str) -> Self {
        self.redirect = Some(screen);
        self
    }

    fn internal(err: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal server error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mapped = match self {
            ApiError::Unauthorized(msg) => Mapped::new(StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden => Mapped::new(StatusCode::FORBIDDEN, "Staff access required"),
            ApiError::BadRequest(msg) => Mapped::new(StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => map_domain(&err),
            ApiError::Workflow(err) => map_workflow(&err),
            ApiError::Projection(err) => Mapped::internal(&err),
        };

        let body = ErrorBody {
            error: mapped.message,
            redirect: mapped.redirect,
        };
        (mapped.status, axum::Json(body)).into_response()
    }
}

fn map_domain(err: &DomainError) -> Mapped {
    match err {
        DomainError::Order(order_err) => match order_err {
            OrderError::NotPlaced => {
                Mapped::new(StatusCode::NOT_FOUND, order_err.to_string()).redirect("orders")
            }
            OrderError::InvalidTransition { .. }
            | OrderError::InconsistentStatus { .. }
            | OrderError::PaymentAlreadyConfirmed
            | OrderError::AlreadyPlaced => Mapped::new(StatusCode::CONFLICT, order_err.to_string()),
            OrderError::NoItems | OrderError::InvalidTotal { .. } => {
                Mapped::new(StatusCode::UNPROCESSABLE_ENTITY, order_err.to_string())
            }
        },
        DomainError::Checkout(checkout_err) => match checkout_err {
            CheckoutError::CartNotFound => {
                Mapped::new(StatusCode::NOT_FOUND, checkout_err.to_string()).redirect("cart")
            }
            CheckoutError::EmptyCart => {
                Mapped::new(StatusCode::CONFLICT, checkout_err.to_string()).redirect("cart")
            }
            CheckoutError::MissingAddress | CheckoutError::CartChanged { .. } => {
                Mapped::new(StatusCode::CONFLICT, checkout_err.to_string()).redirect("checkout")
            }
        },
        DomainError::Cart(cart_err) => match cart_err {
            CartError::ItemNotFound { .. } | CartError::ProductUnavailable(_) => {
                Mapped::new(StatusCode::NOT_FOUND, cart_err.to_string()).redirect("cart")
            }
            CartError::InvalidQuantity { .. }
            | CartError::InvalidPrice { .. }
            | CartError::InvalidVariant { .. } => {
                Mapped::new(StatusCode::UNPROCESSABLE_ENTITY, cart_err.to_string())
            }
            CartError::Empty | CartError::NotOpened => {
                Mapped::new(StatusCode::CONFLICT, cart_err.to_string()).redirect("cart")
            }
        },
        DomainError::Customer(customer_err) => match customer_err {
            CustomerError::NotRegistered => {
                Mapped::new(StatusCode::NOT_FOUND, customer_err.to_string()).redirect("register")
            }
            CustomerError::AlreadyRegistered | CustomerError::EmailTaken => {
                Mapped::new(StatusCode::CONFLICT, customer_err.to_string())
            }
            CustomerError::Validation(validation) => {
                Mapped::new(StatusCode::UNPROCESSABLE_ENTITY, validation.to_string())
            }
        },
        DomainError::EventStore(store_err) if store_err.is_conflict() => Mapped::new(
            StatusCode::CONFLICT,
            "The order changed while you were working on it, please retry",
        ),
        DomainError::EventStore(_) | DomainError::Serialization(_) => Mapped::internal(err),
    }
}

fn map_workflow(err: &WorkflowError) -> Mapped {
    match err {
        WorkflowError::OrderNotFound => {
            Mapped::new(StatusCode::NOT_FOUND, err.to_string()).redirect("orders")
        }
        WorkflowError::PaymentDeclined { .. } => {
            Mapped::new(StatusCode::PAYMENT_REQUIRED, err.to_string()).redirect("checkout")
        }
        WorkflowError::Token(token_err) => {
            Mapped::new(StatusCode::BAD_REQUEST, token_err.to_string()).redirect("orders")
        }
        WorkflowError::Mail(mail_err) => {
            tracing::warn!(error = %mail_err, "confirmation mail not queued");
            Mapped::new(
                StatusCode::BAD_GATEWAY,
                "We could not send the email right now; your order is unaffected",
            )
        }
        WorkflowError::Payment(PaymentError::Unavailable(reason)) => {
            tracing::warn!(%reason, "payment gateway unavailable");
            Mapped::new(
                StatusCode::BAD_GATEWAY,
                "The payment provider is unavailable, nothing was charged",
            )
            .redirect("checkout")
        }
        WorkflowError::Payment(_) => Mapped::internal(err),
        WorkflowError::Domain(domain_err) => map_domain(domain_err),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}
