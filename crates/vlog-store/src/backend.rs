//! Document backend abstraction.
//!
//! A backend stores JSON documents per collection and provides one
//! concurrency primitive: a conditional replace that only applies when the
//! stored `version` equals the version the caller read.

use async_trait::async_trait;
use serde_json::{Map, Value};

use vlog_models::entity::IMMUTABLE_FIELDS;

use crate::error::StoreResult;

/// A stored document body.
pub type JsonMap = Map<String, Value>;

/// Storage engine behind [`crate::Repository`].
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Insert a new document. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, collection: &str, id: &str, doc: JsonMap) -> StoreResult<()>;

    /// Load a document, `None` if missing.
    async fn fetch(&self, collection: &str, id: &str) -> StoreResult<Option<JsonMap>>;

    /// Replace the update facet of a document if its stored version equals
    /// `expected_version`.
    ///
    /// Returns the document as committed, or `None` when the version did not
    /// match. Fails with `NotFound` if the document does not exist.
    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: JsonMap,
    ) -> StoreResult<Option<JsonMap>>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Read the `version` field of a stored document.
pub fn stored_version(doc: &JsonMap) -> u64 {
    doc.get("version").and_then(Value::as_u64).unwrap_or(0)
}

/// Build the committed document: the incoming body with the stored
/// immutable facet (`id`, `owner_id`, `created_at`) carried over.
pub fn merge_update_facet(stored: &JsonMap, mut incoming: JsonMap) -> JsonMap {
    for field in IMMUTABLE_FIELDS {
        match stored.get(field) {
            Some(value) => {
                incoming.insert(field.to_string(), value.clone());
            }
            None => {
                incoming.remove(field);
            }
        }
    }
    incoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> JsonMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_merge_keeps_immutable_facet() {
        let stored = map(json!({
            "id": "a", "owner_id": "alice", "created_at": "t0", "version": 3, "title": "old"
        }));
        let incoming = map(json!({
            "id": "b", "owner_id": "mallory", "created_at": "t9", "version": 4, "title": "new"
        }));

        let merged = merge_update_facet(&stored, incoming);
        assert_eq!(merged["id"], "a");
        assert_eq!(merged["owner_id"], "alice");
        assert_eq!(merged["created_at"], "t0");
        assert_eq!(merged["version"], 4);
        assert_eq!(merged["title"], "new");
    }

    #[test]
    fn test_stored_version() {
        assert_eq!(stored_version(&map(json!({"version": 7}))), 7);
        assert_eq!(stored_version(&map(json!({}))), 0);
    }
}
