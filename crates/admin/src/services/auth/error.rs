//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during passkey authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] backoffice_core::EmailError),

    /// Display name is empty or too long.
    #[error("display name must be 1 to {max} characters")]
    InvalidDisplayName { max: usize },

    /// No profile exists for the email.
    #[error("user not found")]
    UserNotFound,

    /// A profile with the email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// `WebAuthn` error.
    #[error("webauthn error: {0}")]
    WebAuthn(#[from] webauthn_rs::prelude::WebauthnError),

    /// No credentials registered for the user.
    #[error("no passkeys registered for this account")]
    NoCredentials,

    /// Session state missing or invalid.
    #[error("invalid session state")]
    InvalidSessionState,

    /// Repository/store error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
