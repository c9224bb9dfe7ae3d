//! Product listing.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::Product;
use event_store::EventStore;

use crate::state::AppState;

/// GET /products: active catalog.
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<Product>> {
    Json(state.catalog.list_active().await)
}
