//! Typed repository over a record collection.

use std::marker::PhantomData;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::{DocumentStore, RepositoryError, decode};
use crate::models::{Record, Stored};

/// Repository for one record type.
pub struct RecordRepository<'a, R> {
    store: &'a dyn DocumentStore,
    _record: PhantomData<fn() -> R>,
}

impl<'a, R: Record> RecordRepository<'a, R> {
    /// Create a new record repository.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// List every record, numbered records in numeric order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the store fails.
    /// Returns `RepositoryError::DataCorruption` if any document is invalid.
    pub async fn list(&self) -> Result<Vec<Stored<R>>, RepositoryError> {
        let mut documents = self.store.list(R::COLLECTION).await?;
        documents.sort_by(|a, b| a.key.len().cmp(&b.key.len()).then_with(|| a.key.cmp(&b.key)));

        documents
            .iter()
            .map(|doc| -> Result<Stored<R>, RepositoryError> {
                Ok(Stored {
                    id: doc.key.clone(),
                    version: doc.version,
                    record: decode(R::COLLECTION, doc)?,
                })
            })
            .collect()
    }

    /// Get a record by key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the store fails.
    /// Returns `RepositoryError::DataCorruption` if the document is invalid.
    pub async fn get(&self, key: &str) -> Result<Option<Stored<R>>, RepositoryError> {
        let Some(doc) = self.store.get(R::COLLECTION, key).await? else {
            return Ok(None);
        };
        Ok(Some(Stored {
            id: doc.key.clone(),
            version: doc.version,
            record: decode(R::COLLECTION, &doc)?,
        }))
    }

    /// Insert a validated record under `key`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the record breaks a rule.
    /// Returns `RepositoryError::Conflict` if the key already exists.
    pub async fn insert(&self, key: &str, record: R) -> Result<Stored<R>, RepositoryError> {
        record.validate()?;
        let body = serde_json::to_value(&record)?;

        if !self.store.create(R::COLLECTION, key, &body).await? {
            return Err(RepositoryError::Conflict(format!(
                "{}/{key} already exists",
                R::COLLECTION
            )));
        }

        Ok(Stored {
            id: key.to_owned(),
            version: 1,
            record,
        })
    }

    /// Insert a validated record under a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the record breaks a rule.
    pub async fn insert_random(&self, record: R) -> Result<Stored<R>, RepositoryError> {
        self.insert(&Uuid::new_v4().to_string(), record).await
    }

    /// Replace a record if it is still at `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the record breaks a rule.
    /// Returns `RepositoryError::NotFound` if the record does not exist.
    /// Returns `RepositoryError::Conflict` if the record changed since it was read.
    pub async fn update(
        &self,
        key: &str,
        expected_version: i64,
        record: R,
    ) -> Result<Stored<R>, RepositoryError> {
        record.validate()?;
        let body: JsonValue = serde_json::to_value(&record)?;

        if self
            .store
            .replace(R::COLLECTION, key, expected_version, &body)
            .await?
        {
            return Ok(Stored {
                id: key.to_owned(),
                version: expected_version + 1,
                record,
            });
        }

        // Tell a missing record apart from a stale version.
        match self.store.get(R::COLLECTION, key).await? {
            None => Err(RepositoryError::NotFound),
            Some(current) => Err(RepositoryError::Conflict(format!(
                "{}/{key} is at version {}, not {expected_version}",
                R::COLLECTION,
                current.version
            ))),
        }
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the record does not exist.
    pub async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        if self.store.delete(R::COLLECTION, key).await? {
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::{Collection, MemoryDocumentStore};
    use crate::models::Customer;

    fn customer(name: &str) -> Customer {
        serde_json::from_value(json!({"name": name})).unwrap()
    }

    #[tokio::test]
    async fn test_list_orders_numeric_keys_numerically() {
        let store = MemoryDocumentStore::new();
        let repo = RecordRepository::<Customer>::new(&store);
        for key in ["10", "2", "1"] {
            repo.insert(key, customer(&format!("c{key}"))).await.unwrap();
        }

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
    }

    #[tokio::test]
    async fn test_insert_validates_and_refuses_duplicates() {
        let store = MemoryDocumentStore::new();
        let repo = RecordRepository::<Customer>::new(&store);

        assert!(matches!(
            repo.insert("1", customer("")).await,
            Err(RepositoryError::Validation(_))
        ));
        assert!(store.get(Collection::Customers, "1").await.unwrap().is_none());

        repo.insert("1", customer("First")).await.unwrap();
        assert!(matches!(
            repo.insert("1", customer("Second")).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(repo.get("1").await.unwrap().unwrap().record.name, "First");
    }

    #[tokio::test]
    async fn test_update_distinguishes_missing_from_stale() {
        let store = MemoryDocumentStore::new();
        let repo = RecordRepository::<Customer>::new(&store);
        repo.insert("1", customer("First")).await.unwrap();

        let updated = repo.update("1", 1, customer("Renamed")).await.unwrap();
        assert_eq!(updated.version, 2);

        assert!(matches!(
            repo.update("1", 1, customer("Stale")).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            repo.update("2", 1, customer("Ghost")).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_malformed_document_is_corruption() {
        let store = MemoryDocumentStore::new();
        store
            .create(Collection::Customers, "7", &json!({"nom": "wrong shape"}))
            .await
            .unwrap();

        let repo = RecordRepository::<Customer>::new(&store);
        assert!(matches!(
            repo.get("7").await,
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
