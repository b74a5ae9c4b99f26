//! Passkey credential repository.
//!
//! All passkeys of a principal are kept in one `credentials` document keyed by
//! uid, so adding a passkey or bumping its signature counter is a single
//! compare-and-swap on that document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use webauthn_rs::prelude::{AuthenticationResult, Passkey};

use backoffice_core::PrincipalUid;

use super::{Collection, DocumentStore, RepositoryError, decode};

/// A registered passkey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPasskey {
    /// User-facing label (e.g. "MacBook").
    pub name: String,
    pub passkey: Passkey,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialSet {
    passkeys: Vec<StoredPasskey>,
}

/// Repository for passkey credentials.
pub struct CredentialRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CredentialRepository<'a> {
    /// Create a new credential repository.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    async fn load(
        &self,
        uid: PrincipalUid,
    ) -> Result<(Option<i64>, CredentialSet), RepositoryError> {
        match self.store.get(Collection::Credentials, &uid.to_string()).await? {
            Some(doc) => Ok((Some(doc.version), decode(Collection::Credentials, &doc)?)),
            None => Ok((None, CredentialSet::default())),
        }
    }

    async fn save(
        &self,
        uid: PrincipalUid,
        version: Option<i64>,
        set: &CredentialSet,
    ) -> Result<bool, RepositoryError> {
        let key = uid.to_string();
        let body = serde_json::to_value(set)?;
        let written = match version {
            Some(version) => {
                self.store
                    .replace(Collection::Credentials, &key, version, &body)
                    .await?
            }
            None => self.store.create(Collection::Credentials, &key, &body).await?,
        };
        Ok(written)
    }

    /// List the passkeys registered for a principal.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the store fails.
    /// Returns `RepositoryError::DataCorruption` if the stored set is invalid.
    pub async fn list(&self, uid: PrincipalUid) -> Result<Vec<StoredPasskey>, RepositoryError> {
        Ok(self.load(uid).await?.1.passkeys)
    }

    /// Add a passkey for a principal.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the set changed concurrently.
    #[instrument(skip(self, passkey))]
    pub async fn add(
        &self,
        uid: PrincipalUid,
        name: &str,
        passkey: &Passkey,
    ) -> Result<(), RepositoryError> {
        let (version, mut set) = self.load(uid).await?;
        set.passkeys.push(StoredPasskey {
            name: name.to_owned(),
            passkey: passkey.clone(),
            created_at: Utc::now(),
        });
        if self.save(uid, version, &set).await? {
            Ok(())
        } else {
            Err(concurrent_change())
        }
    }

    /// Apply the counter and backup state from a successful authentication.
    ///
    /// Returns `false` if no stored passkey matches the result's credential.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the set changed concurrently.
    #[instrument(skip(self, result))]
    pub async fn record_use(
        &self,
        uid: PrincipalUid,
        result: &AuthenticationResult,
    ) -> Result<bool, RepositoryError> {
        let (version, mut set) = self.load(uid).await?;
        let mut matched = false;
        let mut changed = false;
        for stored in &mut set.passkeys {
            if let Some(updated) = stored.passkey.update_credential(result) {
                matched = true;
                changed |= updated;
            }
        }
        if !changed {
            return Ok(matched);
        }
        if self.save(uid, version, &set).await? {
            Ok(true)
        } else {
            Err(concurrent_change())
        }
    }
}

fn concurrent_change() -> RepositoryError {
    RepositoryError::Conflict("credentials changed concurrently".to_owned())
}
