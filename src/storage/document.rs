//! Collections stored as a single JSON document in the object store.
//!
//! Layout: `{"<collection>": [...], "lastUpdated": "<rfc3339>"}`. A bare JSON
//! array is also accepted on read.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::storage::{Mutation, ObjectStore, Predicate, Repository};

pub struct JsonDocumentRepository<T> {
    store: Arc<dyn ObjectStore>,
    key: String,
    collection: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonDocumentRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// `collection` names both the document key (`{collection}/{collection}.json`)
    /// and the array field inside it.
    pub fn new(store: Arc<dyn ObjectStore>, collection: &str) -> Self {
        Self {
            store,
            key: format!("{0}/{0}.json", collection),
            collection: collection.to_string(),
            _record: PhantomData,
        }
    }

    async fn load(&self) -> Result<Vec<T>, ApiError> {
        let Some(bytes) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };

        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::upstream(format!("Failed to parse {} document", self.collection), e))?;

        let records = match document {
            Value::Array(_) => document,
            Value::Object(mut fields) => fields.remove(&self.collection).unwrap_or(Value::Array(Vec::new())),
            _ => Value::Array(Vec::new()),
        };

        serde_json::from_value(records)
            .map_err(|e| ApiError::upstream(format!("Failed to parse {} document", self.collection), e))
    }

    async fn save(&self, records: &[T]) -> Result<(), ApiError> {
        let records = serde_json::to_value(records)
            .map_err(|e| ApiError::upstream(format!("Failed to serialize {}", self.collection), e))?;

        let mut document = Map::new();
        document.insert(self.collection.clone(), records);
        document.insert("lastUpdated".to_string(), Value::String(Utc::now().to_rfc3339()));

        let bytes = serde_json::to_vec_pretty(&Value::Object(document))
            .map_err(|e| ApiError::upstream(format!("Failed to serialize {}", self.collection), e))?;
        self.store.put(&self.key, bytes, "application/json").await
    }
}

#[async_trait]
impl<T> Repository<T> for JsonDocumentRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Vec<T>, ApiError> {
        self.load().await
    }

    async fn append(&self, item: T) -> Result<(), ApiError> {
        let mut records = self.load().await?;
        records.push(item);
        self.save(&records).await
    }

    async fn update_where(&self, matches: Predicate<'_, T>, update: Mutation<'_, T>) -> Result<usize, ApiError> {
        let mut records = self.load().await?;
        let mut updated = 0;
        for record in records.iter_mut().filter(|r| matches(r)) {
            update(record);
            updated += 1;
        }
        if updated > 0 {
            self.save(&records).await?;
        }
        Ok(updated)
    }

    async fn remove_where(&self, matches: Predicate<'_, T>) -> Result<usize, ApiError> {
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| !matches(r));
        let removed = before - records.len();
        if removed > 0 {
            self.save(&records).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryObjectStore;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        text: String,
    }

    fn note(id: u32, text: &str) -> Note {
        Note { id, text: text.to_string() }
    }

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let store = Arc::new(MemoryObjectStore::new("bucket"));
        let repo: JsonDocumentRepository<Note> = JsonDocumentRepository::new(store.clone(), "notes");
        assert!(repo.list().await.unwrap().is_empty());
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_appends_both_persist() {
        let store = Arc::new(MemoryObjectStore::new("bucket"));
        let repo: JsonDocumentRepository<Note> = JsonDocumentRepository::new(store.clone(), "notes");
        repo.append(note(1, "first")).await.unwrap();
        repo.append(note(2, "second")).await.unwrap();

        assert_eq!(repo.list().await.unwrap(), vec![note(1, "first"), note(2, "second")]);

        let raw: Value = serde_json::from_slice(&store.object("notes/notes.json").unwrap()).unwrap();
        assert_eq!(raw["notes"].as_array().unwrap().len(), 2);
        assert!(raw["lastUpdated"].is_string());
    }

    #[tokio::test]
    async fn test_update_and_remove_only_write_on_match() {
        let store = Arc::new(MemoryObjectStore::new("bucket"));
        let repo: JsonDocumentRepository<Note> = JsonDocumentRepository::new(store.clone(), "notes");
        repo.append(note(1, "a")).await.unwrap();
        repo.append(note(2, "b")).await.unwrap();
        let writes = store.put_count();

        assert_eq!(repo.update_where(&|n| n.id == 9, &|n| n.text.clear()).await.unwrap(), 0);
        assert_eq!(repo.remove_where(&|n| n.id == 9).await.unwrap(), 0);
        assert_eq!(store.put_count(), writes);

        assert_eq!(repo.update_where(&|n| n.id == 2, &|n| n.text = "B".into()).await.unwrap(), 1);
        assert_eq!(repo.remove_where(&|n| n.id == 1).await.unwrap(), 1);
        assert_eq!(repo.list().await.unwrap(), vec![note(2, "B")]);
    }

    #[tokio::test]
    async fn test_reads_bare_array_document() {
        let store = Arc::new(MemoryObjectStore::new("bucket"));
        store.insert("notes/notes.json", json!([{ "id": 7, "text": "legacy" }]).to_string().into_bytes());
        let repo: JsonDocumentRepository<Note> = JsonDocumentRepository::new(store, "notes");
        assert_eq!(repo.list().await.unwrap(), vec![note(7, "legacy")]);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_upstream_error() {
        let store = Arc::new(MemoryObjectStore::new("bucket"));
        store.insert("notes/notes.json", b"{oops".to_vec());
        let repo: JsonDocumentRepository<Note> = JsonDocumentRepository::new(store, "notes");
        assert_eq!(repo.list().await.unwrap_err().status(), 500);
    }
}
