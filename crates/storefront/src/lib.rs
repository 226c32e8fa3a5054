//! Larkspur Storefront library.
//!
//! This crate provides the storefront as a library so the binary, the CLI,
//! and the integration tests share one router and one checkout pipeline.
//!
//! # Modules
//!
//! - [`store`] - Persistence seams and the [`store::Backend`] bundle
//! - [`db`] - `PostgreSQL` implementations of every store
//! - [`payments`] - Payment gateway trait and the Stripe client
//! - [`services`] - Cart, inventory, checkout, notifications, tracking, admin
//! - [`routes`] - axum handlers
//! - [`middleware`] - Sessions, auth extractors, rate limits, request ids

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::{Router, middleware::from_fn};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::state::AppState;
use crate::store::Backend;

/// Build the full application router.
///
/// Sentry layers are added by the binary so tests don't need a client.
pub fn app<B, S>(state: AppState<B>, sessions: SessionManagerLayer<S>) -> Router
where
    B: Backend,
    S: SessionStore + Clone,
{
    routes::routes()
        .layer(sessions)
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                        span.record("latency_ms", latency_ms);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
