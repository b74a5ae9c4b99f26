//! Session-related types for authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use backoffice_core::{Email, PrincipalUid};

/// An authenticated identity.
///
/// Minimal data stored in the session to identify the signed-in user. The
/// principal says nothing about authorization: the access guard looks up
/// the profile on every protected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier; the key of the user's profile.
    pub uid: PrincipalUid,
    /// Email the principal signed in with.
    pub email: Email,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the signed-in principal.
    pub const PRINCIPAL: &str = "principal";

    /// Key for an in-progress passkey registration.
    pub const WEBAUTHN_REG: &str = "webauthn_reg";

    /// Key for an in-progress passkey authentication.
    pub const WEBAUTHN_AUTH: &str = "webauthn_auth";
}
