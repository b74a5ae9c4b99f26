//! Passkey authentication service.
//!
//! Self-service registration and sign-in with `WebAuthn` passkeys. There are
//! no passwords. A newly registered profile always starts as
//! [`UserType::Customer`](backoffice_core::UserType::Customer); entry to the
//! back office requires an administrator to promote it.

mod error;

pub use error::AuthError;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use webauthn_rs::prelude::*;

use backoffice_core::{Email, PrincipalUid};

use crate::db::{CredentialRepository, DocumentStore, ProfileRepository, RepositoryError};
use crate::models::{Principal, UserProfile};

/// Longest accepted display name.
pub const MAX_DISPLAY_NAME: usize = 100;

/// Registration ceremony state kept in the session between start and finish.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub uid: PrincipalUid,
    pub email: Email,
    pub display_name: String,
    pub state: PasskeyRegistration,
}

/// Authentication ceremony state kept in the session between start and finish.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingLogin {
    pub uid: PrincipalUid,
    pub state: PasskeyAuthentication,
}

/// Passkey authentication service.
pub struct AuthService<'a> {
    profiles: ProfileRepository<'a>,
    credentials: CredentialRepository<'a>,
    webauthn: &'a Webauthn,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore, webauthn: &'a Webauthn) -> Self {
        Self {
            profiles: ProfileRepository::new(store),
            credentials: CredentialRepository::new(store),
            webauthn,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Start registering a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::InvalidDisplayName`
    /// for bad input, `AuthError::UserAlreadyExists` if the email is taken.
    /// Returns `AuthError::WebAuthn` if the challenge cannot be generated.
    #[instrument(skip(self, display_name))]
    pub async fn start_registration(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<(CreationChallengeResponse, PendingRegistration), AuthError> {
        let email = Email::parse(email)?;
        let display_name = display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME {
            return Err(AuthError::InvalidDisplayName {
                max: MAX_DISPLAY_NAME,
            });
        }
        if self.profiles.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let uid = PrincipalUid::generate();
        let (challenge, state) = self.webauthn.start_passkey_registration(
            uid.as_uuid(),
            email.as_str(),
            display_name,
            None,
        )?;

        Ok((
            challenge,
            PendingRegistration {
                uid,
                email,
                display_name: display_name.to_owned(),
                state,
            },
        ))
    }

    /// Finish registration: verify the passkey and create the profile.
    ///
    /// The passkey is stored before the profile, so a failure part-way leaves
    /// at most an unreachable credential set and never a profile that cannot
    /// sign in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WebAuthn` if verification fails.
    /// Returns `AuthError::UserAlreadyExists` if the email was taken meanwhile.
    #[instrument(skip_all, fields(uid = %pending.uid))]
    pub async fn finish_registration(
        &self,
        pending: &PendingRegistration,
        response: &RegisterPublicKeyCredential,
    ) -> Result<UserProfile, AuthError> {
        let passkey = self
            .webauthn
            .finish_passkey_registration(response, &pending.state)?;
        self.credentials
            .add(pending.uid, "Passkey", &passkey)
            .await?;

        let profile = UserProfile::register(
            pending.uid,
            pending.email.clone(),
            pending.display_name.clone(),
        );
        self.profiles.create(&profile).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;

        tracing::info!("Account registered");
        Ok(profile)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Start signing in with a passkey.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no profile has the email.
    /// Returns `AuthError::NoCredentials` if the user has no passkeys.
    /// Returns `AuthError::WebAuthn` if the challenge cannot be generated.
    #[instrument(skip(self))]
    pub async fn start_authentication(
        &self,
        email: &str,
    ) -> Result<(RequestChallengeResponse, PendingLogin), AuthError> {
        let email = Email::parse(email)?;
        let profile = self
            .profiles
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let passkeys: Vec<Passkey> = self
            .credentials
            .list(profile.uid)
            .await?
            .into_iter()
            .map(|stored| stored.passkey)
            .collect();
        if passkeys.is_empty() {
            return Err(AuthError::NoCredentials);
        }

        let (challenge, state) = self.webauthn.start_passkey_authentication(&passkeys)?;
        Ok((
            challenge,
            PendingLogin {
                uid: profile.uid,
                state,
            },
        ))
    }

    /// Finish signing in and return the authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WebAuthn` if verification fails.
    /// Returns `AuthError::UserNotFound` if the profile disappeared meanwhile.
    #[instrument(skip_all, fields(uid = %pending.uid))]
    pub async fn finish_authentication(
        &self,
        pending: &PendingLogin,
        response: &PublicKeyCredential,
    ) -> Result<Principal, AuthError> {
        let result = self
            .webauthn
            .finish_passkey_authentication(response, &pending.state)?;

        if result.needs_update() {
            self.credentials.record_use(pending.uid, &result).await?;
        }

        let profile = self
            .profiles
            .get(pending.uid)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(Principal {
            uid: profile.uid,
            email: profile.email,
        })
    }
}
