//! HTTP route handlers for Uncorded.

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use uncorded_common::UncordedError;

use crate::state::AppState;

mod health;
mod sets;

pub use sets::snapshot_lines;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/", get(health::liveness))
        .route("/health", get(health::health_check))

        // Replication stream: /sets/{a,b,...}; a node with no collections asks for /sets/
        .route("/sets/", get(sets::stream_nothing))
        .route("/sets/{name}", get(sets::stream_sets))

        // Local mutation API
        .route("/sets/{name}/items", post(sets::add_item))
        .route(
            "/sets/{name}/items/{id}",
            get(sets::get_item).delete(sets::remove_item),
        )
        .route("/sets/{name}/state", get(sets::get_state))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_status(err: &UncordedError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
