//! Health check endpoints.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

/// Plain liveness probe
pub async fn liveness() -> &'static str {
    "uncorded ok"
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    collections: Vec<String>,
    peers: usize,
    uptime_secs: u64,
}

/// Node status with the collections it serves
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        collections: state.registry.names(),
        peers: state.coordinator.peers().len(),
        uptime_secs: state.uptime_secs(),
    })
}
