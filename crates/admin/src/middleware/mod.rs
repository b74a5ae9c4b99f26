//! HTTP middleware for the back office.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, attach request data)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Session layer (tower-sessions)
//! 4. Access guard (public allow-list, then profile-based authorization)

pub mod auth;
pub mod session;

pub use auth::{
    BackOffice, CurrentPrincipal, GuardContext, GuardRejection, RequireAdmin, access_guard,
    clear_current_principal, denial_response, set_current_principal,
};
pub use session::{SESSION_COOKIE_NAME, create_session_layer, postgres_session_store};
