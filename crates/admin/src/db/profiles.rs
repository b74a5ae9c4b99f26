//! User profile repository.
//!
//! Profiles live in `users` keyed by principal uid. Email uniqueness is
//! enforced by a second collection, `user_emails`, whose documents map an
//! email to the uid that claimed it. Claiming uses `create`, which never
//! overwrites, so two registrations racing for one email cannot both win.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use backoffice_core::{Email, PrincipalUid, UserType};

use super::{Collection, DocumentStore, RepositoryError, decode};
use crate::models::UserProfile;

/// Body of a `user_emails` document.
#[derive(Debug, Serialize, Deserialize)]
struct EmailClaim {
    uid: PrincipalUid,
}

/// Repository for user profiles.
pub struct ProfileRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get a profile by principal uid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the store fails.
    /// Returns `RepositoryError::DataCorruption` if the profile is invalid or
    /// belongs to a different uid than its key.
    pub async fn get(&self, uid: PrincipalUid) -> Result<Option<UserProfile>, RepositoryError> {
        let Some(doc) = self.store.get(Collection::Users, &uid.to_string()).await? else {
            return Ok(None);
        };

        let profile: UserProfile = decode(Collection::Users, &doc)?;
        if profile.uid != uid {
            return Err(RepositoryError::DataCorruption(format!(
                "profile {} is stored under {uid}",
                profile.uid
            )));
        }
        Ok(Some(profile))
    }

    /// Find a profile by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the store fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<UserProfile>, RepositoryError> {
        let Some(doc) = self.store.get(Collection::UserEmails, email.as_str()).await? else {
            return Ok(None);
        };
        let claim: EmailClaim = decode(Collection::UserEmails, &doc)?;
        self.get(claim.uid).await
    }

    /// List every profile ordered by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the store fails.
    /// Returns `RepositoryError::DataCorruption` if any profile is invalid.
    pub async fn list(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        let documents = self.store.list(Collection::Users).await?;
        let mut profiles = documents
            .iter()
            .map(|doc| decode::<UserProfile>(Collection::Users, doc))
            .collect::<Result<Vec<_>, _>>()?;
        profiles.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        Ok(profiles)
    }

    /// Create a profile, claiming its email first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or uid is taken.
    /// Returns `RepositoryError::Store` if the store fails.
    #[instrument(skip(self, profile), fields(uid = %profile.uid))]
    pub async fn create(&self, profile: &UserProfile) -> Result<(), RepositoryError> {
        let claim = serde_json::to_value(EmailClaim { uid: profile.uid })?;
        if !self
            .store
            .create(Collection::UserEmails, profile.email.as_str(), &claim)
            .await?
        {
            return Err(RepositoryError::Conflict(
                "email is already registered".to_owned(),
            ));
        }

        let body = serde_json::to_value(profile)?;
        let created = self
            .store
            .create(Collection::Users, &profile.uid.to_string(), &body)
            .await;

        match created {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.release_email(&profile.email).await;
                Err(RepositoryError::Conflict("profile already exists".to_owned()))
            }
            Err(e) => {
                self.release_email(&profile.email).await;
                Err(e.into())
            }
        }
    }

    async fn release_email(&self, email: &Email) {
        if let Err(e) = self.store.delete(Collection::UserEmails, email.as_str()).await {
            tracing::error!(error = %e, "Failed to release email claim");
        }
    }

    /// Change a profile's user type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    /// Returns `RepositoryError::Conflict` if the profile changed concurrently.
    #[instrument(skip(self))]
    pub async fn set_user_type(
        &self,
        uid: PrincipalUid,
        user_type: UserType,
    ) -> Result<UserProfile, RepositoryError> {
        let key = uid.to_string();
        let doc = self
            .store
            .get(Collection::Users, &key)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut profile: UserProfile = decode(Collection::Users, &doc)?;
        profile.user_type = user_type;
        let body = serde_json::to_value(&profile)?;

        if !self
            .store
            .replace(Collection::Users, &key, doc.version, &body)
            .await?
        {
            return Err(RepositoryError::Conflict(
                "profile changed concurrently".to_owned(),
            ));
        }

        tracing::info!(%user_type, "User type changed");
        Ok(profile)
    }
}
