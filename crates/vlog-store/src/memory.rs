//! In-process document backend.
//!
//! Used for local runs and tests. The version check and the replace happen
//! under one write lock, so the CAS is atomic within the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{merge_update_facet, stored_version, DocumentBackend, JsonMap};
use crate::error::{StoreError, StoreResult};

/// Map-backed document store.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, HashMap<String, JsonMap>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Snapshot of every document in a collection, in no particular order.
    pub async fn documents(&self, collection: &str) -> Vec<JsonMap> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn insert(&self, collection: &str, id: &str, doc: JsonMap) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::AlreadyExists(format!("{}/{}", collection, id)));
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn fetch(&self, collection: &str, id: &str) -> StoreResult<Option<JsonMap>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: JsonMap,
    ) -> StoreResult<Option<JsonMap>> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", collection, id)))?;

        if stored_version(stored) != expected_version {
            return Ok(None);
        }

        let committed = merge_update_facet(stored, doc);
        *stored = committed.clone();
        Ok(Some(committed))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(version: u64, title: &str) -> JsonMap {
        let mut m = JsonMap::new();
        m.insert("id".into(), json!("a"));
        m.insert("version".into(), json!(version));
        m.insert("title".into(), json!(title));
        m
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let backend = MemoryBackend::new();
        backend.insert("vlogs", "a", doc(1, "x")).await.unwrap();
        let err = backend.insert("vlogs", "a", doc(1, "y")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(backend.len("vlogs").await, 1);
    }

    #[tokio::test]
    async fn test_cas_applies_only_on_matching_version() {
        let backend = MemoryBackend::new();
        backend.insert("vlogs", "a", doc(1, "x")).await.unwrap();

        let stale = backend.compare_and_swap("vlogs", "a", 5, doc(6, "stale")).await.unwrap();
        assert!(stale.is_none());

        let committed = backend.compare_and_swap("vlogs", "a", 1, doc(2, "y")).await.unwrap();
        assert_eq!(committed.unwrap()["title"], "y");

        let stored = backend.fetch("vlogs", "a").await.unwrap().unwrap();
        assert_eq!(stored["version"], 2);
    }

    #[tokio::test]
    async fn test_cas_on_missing_document() {
        let backend = MemoryBackend::new();
        let err = backend.compare_and_swap("vlogs", "nope", 1, doc(2, "y")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
