//! Authentication pages.
//!
//! Passkey only: the pages drive the `WebAuthn` JSON API in the browser.

use axum::{
    Router,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::middleware::{CurrentPrincipal, clear_current_principal};
use crate::state::AppState;

const PASSKEY_SCRIPT: &str = include_str!("../../assets/passkey.js");

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page))
        .route("/auth/register", get(register_page))
        .route("/auth/reset", get(reset_page))
        .route("/auth/logout", post(logout))
}

fn page(title: &str, body: &str, with_script: bool) -> Html<String> {
    let script = if with_script {
        format!("<script type=\"module\">{PASSKEY_SCRIPT}</script>")
    } else {
        String::new()
    };
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body><main><h1>{title}</h1>{body}<p id=\"status\" role=\"alert\"></p></main>{script}</body>\n</html>\n"
    ))
}

/// Render the login page.
///
/// GET /auth/login
async fn login_page(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
    if principal.is_some() {
        return Redirect::to("/").into_response();
    }

    page(
        "Sign in",
        "<form id=\"login\"><label>Email <input type=\"email\" name=\"email\" required autocomplete=\"username webauthn\"></label>\
         <button type=\"submit\">Sign in with passkey</button></form>\
         <p><a href=\"/auth/register\">Create an account</a> | <a href=\"/auth/reset\">Lost your passkey?</a></p>",
        true,
    )
    .into_response()
}

/// Render the registration page.
///
/// GET /auth/register
async fn register_page() -> impl IntoResponse {
    page(
        "Create an account",
        "<form id=\"register\"><label>Email <input type=\"email\" name=\"email\" required></label>\
         <label>Name <input type=\"text\" name=\"display_name\" required maxlength=\"100\"></label>\
         <button type=\"submit\">Create passkey</button></form>\
         <p>New accounts need an administrator to grant back-office access.</p>",
        true,
    )
}

/// Render the account recovery page.
///
/// GET /auth/reset
async fn reset_page() -> impl IntoResponse {
    page(
        "Lost your passkey?",
        "<p>There are no passwords to reset. Contact an administrator, who can \
         help you register a new passkey for your account.</p>\
         <p><a href=\"/auth/login\">Back to sign in</a></p>",
        false,
    )
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_principal(&session).await {
        tracing::warn!(error = %e, "Failed to clear session on logout");
    }

    Redirect::to("/auth/login")
}
