//! Document store abstraction.
//!
//! The back office keeps every record as a JSON document in a named
//! collection. Documents carry a version that increments on every replace,
//! which gives callers an optimistic compare-and-swap primitive: read a
//! document, compute the new body, and write it back only if nobody else
//! wrote in between.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Customers,
    Staff,
    Invoices,
    Payments,
    Income,
    Expenses,
    Policies,
    Services,
    Counters,
    Users,
    /// Email to uid index backing profile email uniqueness.
    UserEmails,
    /// Passkeys registered per principal.
    Credentials,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Self; 12] = [
        Self::Customers,
        Self::Staff,
        Self::Invoices,
        Self::Payments,
        Self::Income,
        Self::Expenses,
        Self::Policies,
        Self::Services,
        Self::Counters,
        Self::Users,
        Self::UserEmails,
        Self::Credentials,
    ];

    /// The collection's stored name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Staff => "staff",
            Self::Invoices => "invoices",
            Self::Payments => "payments",
            Self::Income => "income",
            Self::Expenses => "expenses",
            Self::Policies => "policies",
            Self::Services => "services",
            Self::Counters => "counters",
            Self::Users => "users",
            Self::UserEmails => "user_emails",
            Self::Credentials => "credentials",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Key within the collection.
    pub key: String,
    /// Starts at 1 and increments on every successful replace.
    pub version: i64,
    /// Untrusted JSON body; typed layers validate it on read.
    pub body: JsonValue,
    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

/// Errors raised by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A schemaless document store with per-document compare-and-swap.
///
/// Implementations must make `create` and `replace` atomic with respect to
/// each other: two concurrent `replace` calls with the same expected version
/// succeed at most once, and `create` never overwrites.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key.
    async fn get(&self, collection: Collection, key: &str)
    -> Result<Option<Document>, StoreError>;

    /// List every document in a collection, ordered by key.
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// Insert a new document at version 1.
    ///
    /// Returns `false` without writing if the key already exists.
    async fn create(
        &self,
        collection: Collection,
        key: &str,
        body: &JsonValue,
    ) -> Result<bool, StoreError>;

    /// Replace a document if its stored version equals `expected_version`.
    ///
    /// Returns `false` without writing if the document is absent or was
    /// modified since it was read.
    async fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_version: i64,
        body: &JsonValue,
    ) -> Result<bool, StoreError>;

    /// Delete a document. Returns `false` if it did not exist.
    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_are_unique() {
        let mut names: Vec<&str> = Collection::ALL.iter().map(|c| c.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Collection::ALL.len());
    }
}
