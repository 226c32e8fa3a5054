//! Health check handlers.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;
use crate::store::Backend;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the backing store is not reachable.
pub async fn readiness<B: Backend>(State(state): State<AppState<B>>) -> StatusCode {
    if state.backend().ping().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
