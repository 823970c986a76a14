//! Firestore-backed document backend.
//!
//! The conditional write reads the document, checks the stored `version`,
//! then replaces it with an `updateTime` precondition. A concurrent writer
//! that lands between the read and the write makes the precondition fail,
//! which is reported as a version conflict.

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{merge_update_facet, stored_version, DocumentBackend, JsonMap};
use crate::client::FirestoreClient;
use crate::error::{StoreError, StoreResult};
use crate::types::json_to_fields;

#[derive(Clone)]
pub struct FirestoreBackend {
    client: FirestoreClient,
}

impl FirestoreBackend {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn from_env() -> StoreResult<Self> {
        Ok(Self::new(FirestoreClient::from_env().await?))
    }
}

#[async_trait]
impl DocumentBackend for FirestoreBackend {
    async fn insert(&self, collection: &str, id: &str, doc: JsonMap) -> StoreResult<()> {
        self.client
            .create_document(collection, id, json_to_fields(&doc))
            .await?;
        Ok(())
    }

    async fn fetch(&self, collection: &str, id: &str) -> StoreResult<Option<JsonMap>> {
        Ok(self
            .client
            .get_document(collection, id)
            .await?
            .map(|doc| doc.to_json()))
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: JsonMap,
    ) -> StoreResult<Option<JsonMap>> {
        let current = self
            .client
            .get_document(collection, id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", collection, id)))?;

        let stored = current.to_json();
        if stored_version(&stored) != expected_version {
            return Ok(None);
        }

        let update_time = current.update_time.as_deref().ok_or_else(|| {
            StoreError::InvalidResponse(format!("{}/{} has no updateTime", collection, id))
        })?;

        let committed = merge_update_facet(&stored, doc);
        match self
            .client
            .update_document_with_precondition(
                collection,
                id,
                json_to_fields(&committed),
                update_time,
            )
            .await
        {
            Ok(_) => Ok(Some(committed)),
            Err(e) if e.is_precondition_failed() => {
                debug!(collection, id, "updateTime precondition failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}
