use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::Row;

use super::{Document, DocumentStore, RepositoryError};
use crate::DbPool;

pub struct SqlDocumentStore {
    pool: DbPool,
}

impl SqlDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query("SELECT id, data_json FROM document WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw = row.try_get::<String, _>("data_json")?;
        let data = serde_json::from_str::<Value>(&raw).map_err(|error| {
            RepositoryError::Decode(format!("invalid document `{collection}/{id}` ({error})"))
        })?;

        Ok(Some(Document { id: row.try_get("id")?, data }))
    }

    async fn put_document(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<(), RepositoryError> {
        let data_json = serde_json::to_string(&document.data)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO document (collection, id, data_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET
                data_json = excluded.data_json,
                updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(&document.id)
        .bind(data_json)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SqlDocumentStore;
    use crate::repositories::{Document, DocumentStore};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn sql_document_store_upserts_by_collection_and_id() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        let store = SqlDocumentStore::new(pool.clone());

        store
            .put_document(
                "CustomerInstructions",
                Document::new("1234567890", json!({"instruction": "Keep CPA under $40."})),
            )
            .await
            .expect("put document");
        store
            .put_document(
                "CustomerInstructions",
                Document::new("1234567890", json!({"instruction": "Pause weekend spend."})),
            )
            .await
            .expect("overwrite document");

        let found = store
            .get_document("CustomerInstructions", "1234567890")
            .await
            .expect("get document")
            .expect("document exists");
        assert_eq!(found.field("instruction"), Some(&json!("Pause weekend spend.")));

        let other_collection =
            store.get_document("GoogleAdsConfig", "1234567890").await.expect("get document");
        assert!(other_collection.is_none());

        pool.close().await;
    }
}
