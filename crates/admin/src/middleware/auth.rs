//! Access guard middleware and extractors.
//!
//! [`access_guard`] runs the guard on every request. Public paths pass
//! straight through. Protected paths need a signed-in principal whose
//! profile admits them to the back office; anything else gets the denial
//! view. Handlers behind the guard read the outcome with [`BackOffice`] or
//! [`RequireAdmin`].

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use backoffice_core::UserType;

use crate::error::set_sentry_user;
use crate::models::{Principal, session_keys};
use crate::services::{Authorization, DenialReason, GuardState};
use crate::state::AppState;

/// Guard outcome attached to every request that passed the guard.
#[derive(Debug, Clone)]
pub struct GuardContext {
    pub state: GuardState,
}

/// Render the denial view.
///
/// API paths get JSON, pages get a minimal HTML document. The message is
/// generic and offers no further action.
#[must_use]
pub fn denial_response(path: &str, reason: DenialReason) -> Response {
    let status = match reason {
        DenialReason::Unauthenticated => StatusCode::UNAUTHORIZED,
        _ => StatusCode::FORBIDDEN,
    };

    if path.starts_with("/api/") {
        return (status, Json(json!({ "error": reason.message() }))).into_response();
    }

    let page = format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Access denied</title></head>\n<body><main><h1>Access denied</h1><p>{}</p></main></body>\n</html>\n",
        reason.message()
    );
    (status, Html(page)).into_response()
}

/// Middleware that evaluates the access guard for each request.
///
/// Must run inside the session layer.
pub async fn access_guard(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();

    // Public paths are decided before touching the session.
    if state.guard().public_paths().is_public(&path) {
        request.extensions_mut().insert(GuardContext {
            state: GuardState::PublicRoute,
        });
        return next.run(request).await;
    }

    let session = request.extensions().get::<Session>().cloned();
    let principal = match session {
        Some(session) => match session.get::<Principal>(session_keys::PRINCIPAL).await {
            Ok(principal) => principal,
            Err(e) => {
                tracing::warn!(error = %e, "Session read failed");
                return denial_response(&path, DenialReason::LookupFailed);
            }
        },
        None => {
            tracing::error!("Access guard mounted without a session layer");
            return denial_response(&path, DenialReason::LookupFailed);
        }
    };

    let outcome = state.guard().evaluate(&path, principal.as_ref()).await;
    match &outcome {
        GuardState::Denied(reason) => {
            tracing::info!(path = %path, ?reason, "Navigation denied");
            return denial_response(&path, *reason);
        }
        GuardState::Authorized(auth) => {
            set_sentry_user(&auth.principal.uid.to_string(), Some(auth.principal.email.as_str()));
        }
        GuardState::PublicRoute => {}
        // evaluate() always settles; anything else is treated as a denial.
        GuardState::Unresolved | GuardState::Resolving => {
            return denial_response(&path, DenialReason::LookupFailed);
        }
    }

    request.extensions_mut().insert(GuardContext { state: outcome });
    next.run(request).await
}

/// Error returned when a handler's access requirement is not met.
#[derive(Debug)]
pub struct GuardRejection {
    path: String,
    reason: DenialReason,
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        denial_response(&self.path, self.reason)
    }
}

fn authorization(parts: &Parts) -> Result<Authorization, GuardRejection> {
    match parts.extensions.get::<GuardContext>().map(|ctx| &ctx.state) {
        Some(GuardState::Authorized(auth)) => Ok(auth.clone()),
        _ => Err(GuardRejection {
            path: parts.uri.path().to_owned(),
            reason: DenialReason::LookupFailed,
        }),
    }
}

/// Extractor for a principal the guard admitted to the back office.
///
/// Rejects if the route is not behind [`access_guard`] or the path was public.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(BackOffice(auth): BackOffice) -> impl IntoResponse {
///     format!("Hello, {}!", auth.principal.email)
/// }
/// ```
pub struct BackOffice(pub Authorization);

impl<S> FromRequestParts<S> for BackOffice
where
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authorization(parts).map(Self)
    }
}

/// Extractor that additionally requires the `admin` user type.
pub struct RequireAdmin(pub Authorization);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = authorization(parts)?;
        if auth.user_type != UserType::Admin {
            return Err(GuardRejection {
                path: parts.uri.path().to_owned(),
                reason: DenialReason::InsufficientRole(auth.user_type),
            });
        }
        Ok(Self(auth))
    }
}

/// Extractor that optionally gets the signed-in principal.
///
/// Does not consult the guard; used by the public auth pages.
pub struct CurrentPrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = match parts.extensions.get::<Session>() {
            Some(session) => match session.get::<Principal>(session_keys::PRINCIPAL).await {
                Ok(principal) => principal,
                Err(e) => {
                    tracing::warn!(error = %e, "Session read failed, treating as signed out");
                    None
                }
            },
            None => None,
        };

        Ok(Self(principal))
    }
}

/// Helper to sign a principal in.
///
/// Rotates the session id first so a pre-login session id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_principal(
    session: &Session,
    principal: &Principal,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::PRINCIPAL, principal).await
}

/// Helper to clear the signed-in principal from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_principal(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.remove::<Principal>(session_keys::PRINCIPAL).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::Request as HttpRequest;
    use tower_sessions::session::{Id, Record};
    use tower_sessions::session_store::{self, SessionStore};

    use super::*;

    /// Session store whose backend is always down.
    #[derive(Debug, Clone)]
    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn save(&self, _record: &Record) -> session_store::Result<()> {
            Err(session_store::Error::Backend("store down".to_owned()))
        }

        async fn load(&self, _id: &Id) -> session_store::Result<Option<Record>> {
            Err(session_store::Error::Backend("store down".to_owned()))
        }

        async fn delete(&self, _id: &Id) -> session_store::Result<()> {
            Err(session_store::Error::Backend("store down".to_owned()))
        }
    }

    async fn current_principal(session: Option<Session>) -> Option<Principal> {
        let (mut parts, ()) = HttpRequest::builder().body(()).unwrap().into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        CurrentPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_current_principal_treats_unreadable_session_as_signed_out() {
        let session = Session::new(Some(Id::default()), Arc::new(BrokenStore), None);
        assert!(session.get::<Principal>(session_keys::PRINCIPAL).await.is_err());

        assert_eq!(current_principal(Some(session)).await, None);
        assert_eq!(current_principal(None).await, None);
    }

    #[test]
    fn test_denial_statuses() {
        assert_eq!(
            denial_response("/dashboard", DenialReason::Unauthenticated).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            denial_response("/api/customers", DenialReason::InsufficientRole(UserType::Vip)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            denial_response("/payroll", DenialReason::LookupTimedOut).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_denial_content_type() {
        let api = denial_response("/api/staff", DenialReason::ProfileMissing);
        let page = denial_response("/staff", DenialReason::ProfileMissing);
        let content_type = |r: &Response| {
            r.headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .to_owned()
        };
        assert!(content_type(&api).starts_with("application/json"));
        assert!(content_type(&page).starts_with("text/html"));
    }
}
