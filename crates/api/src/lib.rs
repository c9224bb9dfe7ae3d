//! HTTP storefront API for the order engine.
//!
//! Shoppers are identified by the `x-user-id` header; staff fulfilment
//! routes additionally require `x-fulfillment-key`. Responses are JSON, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{InMemoryCatalog, Money, Product};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, Capabilities};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", get(routes::catalog::list::<S>))
        .route("/customers", post(routes::customers::register::<S>))
        .route("/customers/me/address", put(routes::customers::save_address::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route(
            "/cart/items",
            post(routes::cart::add::<S>)
                .patch(routes::cart::update::<S>)
                .delete(routes::cart::remove::<S>),
        )
        .route("/checkout", post(routes::checkout::place::<S>))
        .route("/checkout/card", post(routes::checkout::place_with_card::<S>))
        .route("/checkout/{cart_id}", get(routes::checkout::preview::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/history", get(routes::orders::history::<S>))
        .route(
            "/orders/{id}/verification-email",
            post(routes::orders::request_verification::<S>),
        )
        .route(
            "/orders/{id}/cancellation",
            post(routes::orders::request_cancellation::<S>),
        )
        .route("/confirm/verify", get(routes::confirm::verify::<S>))
        .route("/confirm/cancel", get(routes::confirm::cancel::<S>))
        .route("/payments/callback", post(routes::payments::callback::<S>))
        .route(
            "/fulfillment/orders/{id}/{step}",
            post(routes::fulfillment::advance::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Catalog served when no external catalog is wired in.
pub async fn demo_catalog() -> InMemoryCatalog {
    InMemoryCatalog::with_products([
        Product::new("TEE-CLASSIC", "Classic T-shirt", Money::from_cents(2500))
            .with_sizes(&["S", "M", "L", "XL"])
            .with_colors(&["black", "white"]),
        Product::new("HOODIE-ZIP", "Zip hoodie", Money::from_cents(5900))
            .with_sizes(&["M", "L"])
            .with_colors(&["grey"]),
        Product::new("MUG-LOGO", "Logo mug", Money::from_cents(1400)),
    ])
    .await
}
