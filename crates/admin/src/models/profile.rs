//! User profile domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{Email, PrincipalUid, UserType};

/// The application's own record about a principal (`users` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Principal this profile belongs to (also the document key).
    pub uid: PrincipalUid,
    /// Unique sign-in email.
    pub email: Email,
    /// Name shown in the back office.
    pub display_name: String,
    /// Authorization role checked by the access guard.
    #[serde(rename = "usertype", default)]
    pub user_type: UserType,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// A freshly registered profile with the default user type.
    #[must_use]
    pub fn register(uid: PrincipalUid, email: Email, display_name: impl Into<String>) -> Self {
        Self {
            uid,
            email,
            display_name: display_name.into(),
            user_type: UserType::default(),
            created_at: Utc::now(),
        }
    }
}
