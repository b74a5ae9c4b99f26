//! `PostgreSQL` document store.
//!
//! Every collection lives in the single `backoffice.document` table, keyed by
//! `(collection, key)`. Compare-and-swap is a conditional `UPDATE` on the
//! `version` column, which `PostgreSQL` evaluates atomically under row locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::store::{Collection, Document, DocumentStore, StoreError};

/// Internal row type for document queries.
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    key: String,
    version: i64,
    body: JsonValue,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Self {
            key: row.key,
            version: row.version,
            body: row.body,
            updated_at: row.updated_at,
        }
    }
}

/// Document store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r"
            SELECT key, version, body, updated_at
            FROM backoffice.document
            WHERE collection = $1 AND key = $2
            ",
        )
        .bind(collection.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Document::from))
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r"
            SELECT key, version, body, updated_at
            FROM backoffice.document
            WHERE collection = $1
            ORDER BY key ASC
            ",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn create(
        &self,
        collection: Collection,
        key: &str,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO backoffice.document (collection, key, version, body)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (collection, key) DO NOTHING
            ",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_version: i64,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE backoffice.document
            SET body = $4, version = version + 1, updated_at = NOW()
            WHERE collection = $1 AND key = $2 AND version = $3
            ",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(expected_version)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            DELETE FROM backoffice.document
            WHERE collection = $1 AND key = $2
            ",
        )
        .bind(collection.as_str())
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
