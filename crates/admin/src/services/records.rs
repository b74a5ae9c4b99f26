//! Record creation with sequential numbering.

use thiserror::Error;
use tracing::instrument;

use crate::db::{DocumentStore, RecordRepository, RepositoryError};
use crate::models::{Record, Stored};

use super::allocator::{AllocatorError, IdAllocator};

/// Errors that can occur when creating a record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// No number could be allocated; nothing was written.
    #[error(transparent)]
    Allocation(#[from] AllocatorError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Creates records, numbering them from their counter when they have one.
pub struct RecordService<'a> {
    store: &'a dyn DocumentStore,
    allocator: &'a IdAllocator,
}

impl<'a> RecordService<'a> {
    /// Create a new record service.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore, allocator: &'a IdAllocator) -> Self {
        Self { store, allocator }
    }

    /// Validate, number and store a new record.
    ///
    /// The record is validated before a number is drawn, so invalid input
    /// never consumes one. If allocation fails the record is not written.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Repository` with a validation error for a bad
    /// record, `RecordError::Allocation` if no number could be drawn.
    #[instrument(skip_all, fields(collection = %R::COLLECTION))]
    pub async fn create<R: Record>(&self, record: R) -> Result<Stored<R>, RecordError> {
        record.validate().map_err(RepositoryError::from)?;
        let repo = RecordRepository::<R>::new(self.store);

        let stored = match R::sequence() {
            Some(counter) => {
                let number = self.allocator.next_id(&counter).await?;
                repo.insert(&number.to_string(), record).await?
            }
            None => repo.insert_random(record).await?,
        };

        tracing::info!(id = %stored.id, "Record created");
        Ok(stored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::db::testing::ScriptedStore;
    use crate::db::{Collection, MemoryDocumentStore};
    use crate::models::{Customer, Policy};

    #[tokio::test]
    async fn test_numbered_records_use_their_counter() {
        let store = Arc::new(MemoryDocumentStore::new());
        let allocator = IdAllocator::new(store.clone());
        let service = RecordService::new(store.as_ref(), &allocator);

        for expected in ["1", "2"] {
            let customer: Customer = serde_json::from_value(json!({"name": "Acme"})).unwrap();
            assert_eq!(service.create(customer).await.unwrap().id, expected);
        }
    }

    #[tokio::test]
    async fn test_invalid_record_consumes_no_number() {
        let store = Arc::new(MemoryDocumentStore::new());
        let allocator = IdAllocator::new(store.clone());
        let service = RecordService::new(store.as_ref(), &allocator);

        let blank: Customer = serde_json::from_value(json!({"name": ""})).unwrap();
        assert!(matches!(
            service.create(blank).await,
            Err(RecordError::Repository(RepositoryError::Validation(_)))
        ));
        assert!(store.get(Collection::Counters, "customerCounter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_allocation_failure_writes_nothing() {
        let store = Arc::new(ScriptedStore::failing());
        let allocator = IdAllocator::new(store.clone());
        let service = RecordService::new(store.as_ref(), &allocator);

        let customer: Customer = serde_json::from_value(json!({"name": "Acme"})).unwrap();
        assert!(matches!(
            service.create(customer).await,
            Err(RecordError::Allocation(AllocatorError::Store(_)))
        ));
        assert!(store.inner.list(Collection::Customers).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unnumbered_records_get_uuid_keys() {
        let store = Arc::new(MemoryDocumentStore::new());
        let allocator = IdAllocator::new(store.clone());
        let service = RecordService::new(store.as_ref(), &allocator);

        let policy: Policy = serde_json::from_value(json!({
            "title": "Refunds",
            "body": "Refunds within 30 days.",
            "effective_on": "2026-01-01",
        }))
        .unwrap();
        let stored = service.create(policy).await.unwrap();
        assert!(uuid::Uuid::parse_str(&stored.id).is_ok());
    }
}
