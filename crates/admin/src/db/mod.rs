//! Persistence for the back office.
//!
//! # Storage model
//!
//! Every record is a JSON document in a named [`Collection`] behind the
//! [`DocumentStore`] trait. Two backends exist:
//!
//! - [`PgDocumentStore`] - production, one `backoffice.document` table
//! - [`MemoryDocumentStore`] - tests and local runs
//!
//! Typed repositories ([`RecordRepository`], [`ProfileRepository`],
//! [`CredentialRepository`]) sit on top of the store and turn untrusted JSON
//! into validated domain types.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p backoffice-cli -- migrate
//! ```

pub mod credentials;
pub mod memory;
pub mod postgres;
pub mod profiles;
pub mod records;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use credentials::CredentialRepository;
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use profiles::ProfileRepository;
pub use records::RecordRepository;
pub use store::{Collection, Document, DocumentStore, StoreError};

use crate::models::ValidationError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The document store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document does not decode into its record type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A record could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// The key is taken or the document changed since it was read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record breaks a business rule.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Decode a stored document body, reporting failures as corruption.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    collection: Collection,
    document: &Document,
) -> Result<T, RepositoryError> {
    serde_json::from_value(document.body.clone()).map_err(|e| {
        RepositoryError::DataCorruption(format!(
            "invalid document {collection}/{}: {e}",
            document.key
        ))
    })
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
