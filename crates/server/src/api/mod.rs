//! REST API layer: router construction, handlers, models, errors.

/// API error types mapped to the wire envelope.
pub mod errors;
/// HTTP request handlers and shared application state.
pub mod handlers;
/// Request and response data transfer objects.
pub mod models;

use axum::routing::{get, post};
use axum::Router;
use handlers::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/upsert", post(handlers::upsert))
        .route("/query", post(handlers::query))
        .route("/search", post(handlers::search))
        .route("/insert", post(handlers::insert))
        .route("/admin/snapshot", post(handlers::snapshot))
        .route("/health", get(handlers::health))
        .with_state(state)
}
