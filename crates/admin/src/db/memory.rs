//! In-memory document store.
//!
//! Backs the test suites and local experiments. All operations run under a
//! single mutex, so `create` and `replace` are trivially atomic.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use super::store::{Collection, Document, DocumentStore, StoreError};

/// Document store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<(Collection, String), Document>>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<(Collection, String), Document>>, StoreError>
    {
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_owned()))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.lock()?.get(&(collection, key.to_owned())).cloned())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn create(
        &self,
        collection: Collection,
        key: &str,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        let mut documents = self.lock()?;
        let slot = (collection, key.to_owned());
        if documents.contains_key(&slot) {
            return Ok(false);
        }
        documents.insert(
            slot,
            Document {
                key: key.to_owned(),
                version: 1,
                body: body.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_version: i64,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        let mut documents = self.lock()?;
        match documents.get_mut(&(collection, key.to_owned())) {
            Some(doc) if doc.version == expected_version => {
                doc.version += 1;
                doc.body = body.clone();
                doc.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .remove(&(collection, key.to_owned()))
            .is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
