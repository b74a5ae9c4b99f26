//! HTTP route handlers for the back office.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check (public)
//! GET  /health/ready                    - Store readiness probe (public)
//!
//! # Auth (passkeys only, public)
//! GET  /auth/login                      - Sign-in page
//! GET  /auth/register                   - Registration page
//! GET  /auth/reset                      - Account recovery page
//! POST /auth/logout                     - Clear the session principal
//! POST /api/auth/webauthn/register/{start,finish}
//! POST /api/auth/webauthn/authenticate/{start,finish}
//!
//! # Back office (admin and staff)
//! GET  /                                - Dashboard
//! GET  /api/dashboard/summary           - Financial summary
//! GET|POST /api/<collection>            - List / create records
//! GET|PUT|DELETE /api/<collection>/{id} - Show / update / delete a record
//! POST /api/notifications/send          - Forward a push notification
//!
//! # User management (admin only)
//! GET  /api/users                       - List profiles
//! PUT  /api/users/{uid}/usertype        - Change a profile's user type
//! ```
//!
//! Collections: customers, staff, invoices, payments, income, expenses,
//! services, policies.

pub mod api;
pub mod auth;
pub mod dashboard;
pub mod notifications;
pub mod records;
pub mod users;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use crate::state::AppState;

/// Build the complete router.
///
/// The caller layers the access guard and the session layer on top.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .merge(auth::router())
        .merge(api::router())
        .merge(dashboard::router())
        .merge(records::router())
        .merge(users::router())
        .merge(notifications::router())
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// GET /health/ready
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.store().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
