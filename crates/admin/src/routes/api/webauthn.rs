//! `WebAuthn` API routes.
//!
//! JSON API endpoints for passkey registration and authentication. Ceremony
//! state lives in the session between the start and finish calls and is
//! removed as soon as it is read, so each challenge can be answered once.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use webauthn_rs::prelude::*;

use crate::error::AppError;
use crate::middleware::set_current_principal;
use crate::models::{Principal, session_keys};
use crate::services::{AuthError, AuthService, PendingLogin, PendingRegistration};
use crate::state::AppState;

/// Build the `WebAuthn` API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/auth/webauthn/register/start",
            post(start_registration),
        )
        .route(
            "/api/auth/webauthn/register/finish",
            post(finish_registration),
        )
        .route(
            "/api/auth/webauthn/authenticate/start",
            post(start_authentication),
        )
        .route(
            "/api/auth/webauthn/authenticate/finish",
            post(finish_authentication),
        )
}

/// Response after a ceremony completes and the principal is signed in.
#[derive(Debug, Serialize)]
pub struct SignedInResponse {
    pub success: bool,
    pub redirect: String,
}

impl SignedInResponse {
    fn home() -> Self {
        Self {
            success: true,
            redirect: "/".to_owned(),
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Request to start passkey registration.
#[derive(Debug, Deserialize)]
pub struct StartRegistrationRequest {
    pub email: String,
    pub display_name: String,
}

/// Response from starting passkey registration.
#[derive(Debug, Serialize)]
pub struct StartRegistrationResponse {
    pub options: CreationChallengeResponse,
}

/// Start registering a new account.
///
/// POST /api/auth/webauthn/register/start
async fn start_registration(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<StartRegistrationRequest>,
) -> Result<Json<StartRegistrationResponse>, AppError> {
    let auth = AuthService::new(state.store(), state.webauthn());
    let (options, pending) = auth
        .start_registration(&req.email, &req.display_name)
        .await?;

    session.insert(session_keys::WEBAUTHN_REG, pending).await?;

    Ok(Json(StartRegistrationResponse { options }))
}

/// Request to finish passkey registration.
#[derive(Debug, Deserialize)]
pub struct FinishRegistrationRequest {
    /// The `WebAuthn` response from the authenticator.
    pub credential: RegisterPublicKeyCredential,
}

/// Finish registration and sign the new account in.
///
/// POST /api/auth/webauthn/register/finish
async fn finish_registration(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<FinishRegistrationRequest>,
) -> Result<Json<SignedInResponse>, AppError> {
    let pending: PendingRegistration = session
        .remove(session_keys::WEBAUTHN_REG)
        .await?
        .ok_or(AuthError::InvalidSessionState)?;

    let auth = AuthService::new(state.store(), state.webauthn());
    let profile = auth.finish_registration(&pending, &req.credential).await?;

    let principal = Principal {
        uid: profile.uid,
        email: profile.email,
    };
    set_current_principal(&session, &principal).await?;

    Ok(Json(SignedInResponse::home()))
}

// ============================================================================
// Authentication
// ============================================================================

/// Request to start passkey authentication.
#[derive(Debug, Deserialize)]
pub struct StartAuthenticationRequest {
    pub email: String,
}

/// Response from starting passkey authentication.
#[derive(Debug, Serialize)]
pub struct StartAuthenticationResponse {
    pub options: RequestChallengeResponse,
}

/// Start signing in.
///
/// POST /api/auth/webauthn/authenticate/start
async fn start_authentication(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<StartAuthenticationRequest>,
) -> Result<Json<StartAuthenticationResponse>, AppError> {
    let auth = AuthService::new(state.store(), state.webauthn());
    let (options, pending) = auth.start_authentication(&req.email).await?;

    session.insert(session_keys::WEBAUTHN_AUTH, pending).await?;

    Ok(Json(StartAuthenticationResponse { options }))
}

/// Request to finish passkey authentication.
#[derive(Debug, Deserialize)]
pub struct FinishAuthenticationRequest {
    pub credential: PublicKeyCredential,
}

/// Finish signing in.
///
/// POST /api/auth/webauthn/authenticate/finish
async fn finish_authentication(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<FinishAuthenticationRequest>,
) -> Result<Json<SignedInResponse>, AppError> {
    let pending: PendingLogin = session
        .remove(session_keys::WEBAUTHN_AUTH)
        .await?
        .ok_or(AuthError::InvalidSessionState)?;

    let auth = AuthService::new(state.store(), state.webauthn());
    let principal = auth
        .finish_authentication(&pending, &req.credential)
        .await?;

    set_current_principal(&session, &principal).await?;
    tracing::info!(uid = %principal.uid, "Signed in");

    Ok(Json(SignedInResponse::home()))
}
