//! Store wrappers for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{Collection, Document, DocumentStore, MemoryDocumentStore, StoreError};

/// In-memory store with injectable failures, read delays and a read counter.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryDocumentStore,
    failing: bool,
    delays: HashMap<String, Duration>,
    gets: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Delay reads of `key` (in any collection) by `delay`.
    pub fn with_delay(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(key.into(), delay);
        self
    }

    /// Number of `get` calls so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable("scripted failure".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn get(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        self.check()?;
        self.inner.get(collection, key).await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        self.inner.list(collection).await
    }

    async fn create(
        &self,
        collection: Collection,
        key: &str,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.create(collection, key, body).await
    }

    async fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_version: i64,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.replace(collection, key, expected_version, body).await
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(collection, key).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}
