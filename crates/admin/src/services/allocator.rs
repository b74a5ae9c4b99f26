//! Sequential ID allocation.
//!
//! Each named counter is a document in `counters` with body `{"value": n}`.
//! [`IdAllocator::next_id`] reads the counter, writes `n + 1` with a
//! compare-and-swap on the document version, and retries when another writer
//! got there first. A lost race always means some other caller succeeded, so
//! the loop makes global progress and no two callers ever receive the same
//! number.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use backoffice_core::{CounterName, SequenceNumber};

use crate::db::{Collection, Document, DocumentStore, StoreError};

/// Errors that can occur while allocating an ID.
#[derive(Debug, Error)]
pub enum AllocatorError {
    /// The document store failed; nothing was allocated.
    #[error("counter store error: {0}")]
    Store(#[from] StoreError),

    /// The stored counter is not a valid non-negative integer.
    #[error("counter {counter} is corrupted: {reason}")]
    Corrupted { counter: CounterName, reason: String },

    /// The counter reached the largest representable value.
    #[error("counter {0} is exhausted")]
    Exhausted(CounterName),
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterDocument {
    value: i64,
}

impl CounterDocument {
    fn body(value: i64) -> serde_json::Value {
        serde_json::json!({ "value": value })
    }
}

/// Allocates strictly increasing numbers from named counters.
#[derive(Clone)]
pub struct IdAllocator {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdAllocator").finish_non_exhaustive()
    }
}

impl IdAllocator {
    /// Create an allocator over a store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn read_value(counter: &CounterName, doc: &Document) -> Result<i64, AllocatorError> {
        let parsed: CounterDocument =
            serde_json::from_value(doc.body.clone()).map_err(|e| AllocatorError::Corrupted {
                counter: counter.clone(),
                reason: e.to_string(),
            })?;
        if parsed.value < 0 {
            return Err(AllocatorError::Corrupted {
                counter: counter.clone(),
                reason: format!("negative value {}", parsed.value),
            });
        }
        Ok(parsed.value)
    }

    /// Allocate the next number from `counter`.
    ///
    /// The first allocation from an unseen counter creates it and returns 1.
    ///
    /// # Errors
    ///
    /// Returns `AllocatorError::Store` if the store fails.
    /// Returns `AllocatorError::Corrupted` if the stored counter is invalid.
    /// Returns `AllocatorError::Exhausted` if the counter cannot grow.
    #[instrument(skip(self), fields(counter = %counter))]
    pub async fn next_id(&self, counter: &CounterName) -> Result<SequenceNumber, AllocatorError> {
        loop {
            match self.store.get(Collection::Counters, counter.as_str()).await? {
                None => {
                    let body = CounterDocument::body(SequenceNumber::FIRST.get());
                    if self
                        .store
                        .create(Collection::Counters, counter.as_str(), &body)
                        .await?
                    {
                        debug!("Counter created");
                        return Ok(SequenceNumber::FIRST);
                    }
                }
                Some(doc) => {
                    let current = Self::read_value(counter, &doc)?;
                    let next = current
                        .checked_add(1)
                        .ok_or_else(|| AllocatorError::Exhausted(counter.clone()))?;
                    if self
                        .store
                        .replace(
                            Collection::Counters,
                            counter.as_str(),
                            doc.version,
                            &CounterDocument::body(next),
                        )
                        .await?
                    {
                        return SequenceNumber::new(next).map_err(|e| AllocatorError::Corrupted {
                            counter: counter.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            debug!("Counter write lost a race, retrying");
        }
    }

    /// Read a counter's current value without changing it.
    ///
    /// # Errors
    ///
    /// Returns `AllocatorError::Store` if the store fails.
    /// Returns `AllocatorError::Corrupted` if the stored counter is invalid.
    pub async fn current(&self, counter: &CounterName) -> Result<Option<i64>, AllocatorError> {
        self.store
            .get(Collection::Counters, counter.as_str())
            .await?
            .map(|doc| Self::read_value(counter, &doc))
            .transpose()
    }

    /// Raise a counter to at least `floor`, never lowering it.
    ///
    /// Returns the counter's value afterwards. Used when importing records
    /// that were numbered elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `AllocatorError::Store` if the store fails.
    /// Returns `AllocatorError::Corrupted` if `floor` is negative or the
    /// stored counter is invalid.
    #[instrument(skip(self), fields(counter = %counter))]
    pub async fn advance_to(&self, counter: &CounterName, floor: i64) -> Result<i64, AllocatorError> {
        if floor < 0 {
            return Err(AllocatorError::Corrupted {
                counter: counter.clone(),
                reason: format!("cannot advance to negative value {floor}"),
            });
        }

        let body = CounterDocument::body(floor);
        loop {
            let written = match self.store.get(Collection::Counters, counter.as_str()).await? {
                None => {
                    self.store
                        .create(Collection::Counters, counter.as_str(), &body)
                        .await?
                }
                Some(doc) => {
                    let current = Self::read_value(counter, &doc)?;
                    if current >= floor {
                        return Ok(current);
                    }
                    self.store
                        .replace(Collection::Counters, counter.as_str(), doc.version, &body)
                        .await?
                }
            };
            if written {
                tracing::info!(value = floor, "Counter advanced");
                return Ok(floor);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value as JsonValue, json};
    use tokio::sync::Barrier;

    use super::*;
    use crate::db::MemoryDocumentStore;
    use crate::db::testing::ScriptedStore;

    /// Holds the first two counter reads until both have happened, forcing
    /// the two callers to race on the same version.
    struct LockstepStore {
        inner: MemoryDocumentStore,
        reads: AtomicUsize,
        barrier: Barrier,
    }

    #[async_trait]
    impl DocumentStore for LockstepStore {
        async fn get(
            &self,
            collection: Collection,
            key: &str,
        ) -> Result<Option<Document>, StoreError> {
            let doc = self.inner.get(collection, key).await?;
            if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.barrier.wait().await;
            }
            Ok(doc)
        }

        async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
            self.inner.list(collection).await
        }

        async fn create(
            &self,
            collection: Collection,
            key: &str,
            body: &JsonValue,
        ) -> Result<bool, StoreError> {
            self.inner.create(collection, key, body).await
        }

        async fn replace(
            &self,
            collection: Collection,
            key: &str,
            expected_version: i64,
            body: &JsonValue,
        ) -> Result<bool, StoreError> {
            self.inner.replace(collection, key, expected_version, body).await
        }

        async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
            self.inner.delete(collection, key).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn allocator() -> (Arc<MemoryDocumentStore>, IdAllocator) {
        let store = Arc::new(MemoryDocumentStore::new());
        let allocator = IdAllocator::new(store.clone());
        (store, allocator)
    }

    async fn stored_value(store: &MemoryDocumentStore, name: &CounterName) -> JsonValue {
        store
            .get(Collection::Counters, name.as_str())
            .await
            .unwrap()
            .unwrap()
            .body
    }

    #[tokio::test]
    async fn test_first_call_creates_counter() {
        let (store, allocator) = allocator();
        let name = CounterName::parse("newCounter").unwrap();

        assert_eq!(allocator.next_id(&name).await.unwrap().get(), 1);
        assert_eq!(stored_value(&store, &name).await, json!({"value": 1}));
    }

    #[tokio::test]
    async fn test_sequential_calls_increment() {
        let (store, allocator) = allocator();

        assert_eq!(allocator.next_id(&CounterName::STAFF).await.unwrap().get(), 1);
        assert_eq!(allocator.next_id(&CounterName::STAFF).await.unwrap().get(), 2);
        assert_eq!(stored_value(&store, &CounterName::STAFF).await, json!({"value": 2}));
    }

    #[tokio::test]
    async fn test_forced_race_yields_distinct_ids() {
        let inner = MemoryDocumentStore::new();
        inner
            .create(Collection::Counters, "customerCounter", &json!({"value": 5}))
            .await
            .unwrap();
        let store = Arc::new(LockstepStore {
            inner,
            reads: AtomicUsize::new(0),
            barrier: Barrier::new(2),
        });
        let allocator = IdAllocator::new(store.clone());

        let (a, b) = tokio::join!(
            allocator.next_id(&CounterName::CUSTOMER),
            allocator.next_id(&CounterName::CUSTOMER),
        );
        let ids: BTreeSet<i64> = [a.unwrap().get(), b.unwrap().get()].into();
        assert_eq!(ids, BTreeSet::from([6, 7]));

        let doc = store
            .inner
            .get(Collection::Counters, "customerCounter")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.body, json!({"value": 7}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_unique_and_gapless() {
        const CALLERS: i64 = 200;
        let (_store, allocator) = allocator();
        let name = CounterName::parse("fresh").unwrap();

        let mut handles = Vec::new();
        for _ in 0..CALLERS {
            let allocator = allocator.clone();
            let name = name.clone();
            handles.push(tokio::spawn(async move { allocator.next_id(&name).await }));
        }

        let mut ids = BTreeSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap().unwrap().get()));
        }
        assert_eq!(ids, (1..=CALLERS).collect::<BTreeSet<_>>());
    }

    #[tokio::test]
    async fn test_store_failure_aborts() {
        let allocator = IdAllocator::new(Arc::new(ScriptedStore::failing()));
        assert!(matches!(
            allocator.next_id(&CounterName::INVOICE).await,
            Err(AllocatorError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_counter_is_not_overwritten() {
        let (store, allocator) = allocator();
        store
            .create(Collection::Counters, "invoiceCounter", &json!({"value": "seven"}))
            .await
            .unwrap();

        assert!(matches!(
            allocator.next_id(&CounterName::INVOICE).await,
            Err(AllocatorError::Corrupted { .. })
        ));
        assert_eq!(
            stored_value(&store, &CounterName::INVOICE).await,
            json!({"value": "seven"})
        );
    }

    #[tokio::test]
    async fn test_exhausted_counter() {
        let (store, allocator) = allocator();
        store
            .create(Collection::Counters, "big", &json!({"value": i64::MAX}))
            .await
            .unwrap();

        let name = CounterName::parse("big").unwrap();
        assert!(matches!(
            allocator.next_id(&name).await,
            Err(AllocatorError::Exhausted(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_counter_starts_at_one() {
        let (store, allocator) = allocator();
        store
            .create(Collection::Counters, "staffCounter", &json!({"value": 0}))
            .await
            .unwrap();

        assert_eq!(allocator.next_id(&CounterName::STAFF).await.unwrap().get(), 1);
        assert_eq!(stored_value(&store, &CounterName::STAFF).await, json!({"value": 1}));
    }

    #[tokio::test]
    async fn test_advance_to_zero_creates_empty_counter() {
        let (store, allocator) = allocator();
        let name = CounterName::parse("imported").unwrap();

        assert_eq!(allocator.advance_to(&name, 0).await.unwrap(), 0);
        assert_eq!(stored_value(&store, &name).await, json!({"value": 0}));
        assert_eq!(allocator.next_id(&name).await.unwrap().get(), 1);
        assert!(matches!(
            allocator.advance_to(&name, -1).await,
            Err(AllocatorError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_advance_to_never_lowers() {
        let (_store, allocator) = allocator();
        let name = CounterName::INVOICE;

        assert_eq!(allocator.current(&name).await.unwrap(), None);
        assert_eq!(allocator.advance_to(&name, 1000).await.unwrap(), 1000);
        assert_eq!(allocator.advance_to(&name, 10).await.unwrap(), 1000);
        assert_eq!(allocator.next_id(&name).await.unwrap().get(), 1001);
        assert_eq!(allocator.current(&name).await.unwrap(), Some(1001));
    }
}
