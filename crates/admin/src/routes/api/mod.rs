//! JSON API route handlers.

pub mod webauthn;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new().merge(webauthn::router())
}
