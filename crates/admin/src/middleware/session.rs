//! Session middleware configuration.
//!
//! Sessions are `PostgreSQL`-backed in production using tower-sessions with
//! strict settings (SameSite=Strict, 24hr inactivity expiry). Tests plug in
//! any other [`SessionStore`].

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;
use url::Url;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "backoffice_session";

/// Session expiry time in seconds (24 hours).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Create the `PostgreSQL` session store.
///
/// The session table is created by the `backoffice` schema migration.
///
/// # Panics
///
/// Panics if the schema name or table name is invalid (should never happen
/// with hardcoded "backoffice" and "session" values).
#[must_use]
pub fn postgres_session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
        .with_schema_name("backoffice")
        .expect("valid schema name")
        .with_table_name("session")
        .expect("valid table name")
}

/// Create the session layer over `store`.
///
/// The cookie is marked `Secure` when the back office is served over HTTPS.
#[must_use]
pub fn create_session_layer<S>(store: S, base_url: &Url) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    let is_secure = base_url.scheme() == "https";

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
