//! Back-office server library.
//!
//! Records, invoicing, payroll and reporting for a small business, served
//! behind an access guard that admits only `admin` and `staff` profiles.
//! Built as a library so the binary, the CLI and the integration tests share
//! one router.
//!
//! # Security
//!
//! Every path outside the public allow-list requires a signed-in principal
//! whose profile is looked up on each request. Lookup failures and timeouts
//! deny access.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::SessionStore;
use tracing::Span;

use middleware::{access_guard, create_session_layer};
use state::AppState;

/// Assemble the application router with the guard, sessions and tracing.
pub fn build_app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    with_layers(routes::routes(), state, session_store)
}

/// Wrap `routes` in the guard, session and tracing layers.
///
/// Layers run outermost first: request tracing, then the session layer, then
/// the access guard, then the handlers. Any route added here is guarded
/// unless its path is on the public allow-list.
pub fn with_layers<S>(routes: Router<AppState>, state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(session_store, &state.config().base_url);

    routes
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            access_guard,
        ))
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
