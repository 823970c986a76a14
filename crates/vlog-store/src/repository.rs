//! Typed repository with id/owner/version assignment and CAS updates.
//!
//! Every write goes through this type:
//! - `create` assigns the id (when empty), the owner (from the acting
//!   identity, when empty), `version = 1` and timestamps, then validates
//! - `update` is a conditional write on `(id, version)` and returns the
//!   committed record with `version + 1`
//! - `modify` wraps fetch → mutate → CAS with bounded re-fetching

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use vlog_models::{new_record_id, Entity};

use crate::backend::{DocumentBackend, JsonMap};
use crate::error::{StoreError, StoreResult};
use crate::metrics::record_conflict;

/// Typed access to one collection.
pub struct Repository<T> {
    backend: Arc<dyn DocumentBackend>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    /// Insert a new record on behalf of `actor`.
    ///
    /// An id already present on the record is kept; an owner already present
    /// is kept. The returned record carries the assigned metadata.
    pub async fn create(&self, actor: &str, mut record: T) -> StoreResult<T> {
        let now = Utc::now();
        {
            let meta = record.meta_mut();
            if meta.id.is_empty() {
                meta.id = new_record_id();
            }
            if meta.owner_id.is_empty() {
                meta.owner_id = actor.to_string();
            }
            if meta.owner_id.is_empty() {
                return Err(StoreError::validation("owner_id is required"));
            }
            meta.version = 1;
            meta.created_at = now;
            meta.updated_at = now;
        }
        record.validate().map_err(StoreError::Validation)?;

        let doc = to_document(&record)?;
        self.backend.insert(T::COLLECTION, record.id(), doc).await?;

        debug!(
            collection = T::COLLECTION,
            id = %record.id(),
            owner_id = %record.owner_id(),
            "Created record"
        );
        Ok(record)
    }

    /// Load a record, failing with `NotFound` if missing.
    pub async fn get(&self, id: &str) -> StoreResult<T> {
        self.find(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", T::COLLECTION, id)))
    }

    /// Load a record if it exists.
    pub async fn find(&self, id: &str) -> StoreResult<Option<T>> {
        match self.backend.fetch(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Conditionally write `record`, expecting the stored version to equal
    /// `record.version()`.
    ///
    /// Only the update facet is written; `id`, `owner_id` and `created_at`
    /// keep their stored values.
    pub async fn update(&self, record: &T) -> StoreResult<T> {
        let expected = record.version();
        if expected == 0 {
            return Err(StoreError::validation("record has not been created yet"));
        }

        let mut next = record.clone();
        {
            let meta = next.meta_mut();
            meta.version = expected + 1;
            meta.updated_at = Utc::now();
        }
        let doc = to_document(&next)?;

        match self
            .backend
            .compare_and_swap(T::COLLECTION, record.id(), expected, doc)
            .await?
        {
            Some(committed) => from_document(committed),
            None => {
                record_conflict(T::COLLECTION);
                debug!(
                    collection = T::COLLECTION,
                    id = %record.id(),
                    expected_version = expected,
                    "Optimistic lock conflict"
                );
                Err(StoreError::conflict(T::COLLECTION, record.id(), expected))
            }
        }
    }

    /// Fetch, mutate and conditionally write, re-fetching on conflict.
    ///
    /// `mutate` returns false to skip the write (nothing to change); the
    /// result is then `Ok(None)`. After `attempts` conflicting writes the
    /// call fails with `ConcurrentUpdateExhausted`.
    pub async fn modify<F>(&self, id: &str, attempts: u32, mut mutate: F) -> StoreResult<Option<T>>
    where
        F: FnMut(&mut T) -> bool + Send,
    {
        let attempts = attempts.max(1);
        for attempt in 0..attempts {
            let mut record = self.get(id).await?;
            if !mutate(&mut record) {
                return Ok(None);
            }

            match self.update(&record).await {
                Ok(committed) => return Ok(Some(committed)),
                Err(e) if e.is_conflict() && attempt + 1 < attempts => {
                    warn!(
                        collection = T::COLLECTION,
                        id = %id,
                        attempt = attempt + 1,
                        "Conflicting update, re-fetching"
                    );
                    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                }
                Err(e) if e.is_conflict() => break,
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::ConcurrentUpdateExhausted {
            collection: T::COLLECTION.to_string(),
            id: id.to_string(),
            attempts,
        })
    }
}

fn to_document<T: Entity>(record: &T) -> StoreResult<JsonMap> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidResponse(format!(
            "{} did not serialize to an object: {}",
            T::COLLECTION,
            other
        ))),
    }
}

fn from_document<T: Entity>(doc: JsonMap) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use vlog_models::{JobStatus, MediaJob, Notification, VlogJob, VlogRequest};

    fn repo<T: Entity>() -> Repository<T> {
        Repository::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_create_assigns_id_owner_and_version() {
        let repo = repo::<VlogJob>();
        let mut job = VlogJob::new("", VlogRequest::default());
        job.meta.owner_id.clear();

        let created = repo.create("alice", job).await.unwrap();
        assert!(!created.id().is_empty());
        assert_eq!(created.owner_id(), "alice");
        assert_eq!(created.version(), 1);
    }

    #[tokio::test]
    async fn test_create_keeps_existing_id() {
        let repo = repo::<MediaJob>();
        let mut media = MediaJob::uploading("alice", "a.jpg", "image/jpeg", 1);
        media.meta.id = "fixed-id".into();

        let created = repo.create("bob", media).await.unwrap();
        assert_eq!(created.id(), "fixed-id");
        assert_eq!(created.owner_id(), "alice");

        let dup = MediaJob {
            meta: vlog_models::RecordMeta::with_id("fixed-id"),
            ..created.clone()
        };
        let err = repo.create("alice", dup).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_create_requires_owner() {
        let repo = repo::<VlogJob>();
        let job = VlogJob::new("", VlogRequest::default());
        let err = repo.create("", job).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_runs_entity_validation() {
        let repo = repo::<Notification>();
        let mut n = Notification::vlog_failed("alice", "v1", "boom");
        n.message.clear();
        let err = repo.create("alice", n).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_version_counts_updates() {
        let repo = repo::<VlogJob>();
        let mut job = repo.create("alice", VlogJob::new("alice", VlogRequest::default())).await.unwrap();

        for n in 1..=4 {
            job.state.advance(0.1 * n as f64);
            job = repo.update(&job).await.unwrap();
        }
        assert_eq!(job.version(), 5);
        assert_eq!(repo.get(job.id()).await.unwrap().version(), 5);
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let repo = repo::<VlogJob>();
        let mut job = repo.create("alice", VlogJob::new("alice", VlogRequest::default())).await.unwrap();
        for _ in 0..4 {
            job = repo.update(&job).await.unwrap();
        }
        assert_eq!(job.version(), 5);

        let mut first = repo.get(job.id()).await.unwrap();
        let mut second = first.clone();

        first.title = Some("first".into());
        let committed = repo.update(&first).await.unwrap();
        assert_eq!(committed.version(), 6);

        second.title = Some("second".into());
        let err = repo.update(&second).await.unwrap_err();
        assert!(err.is_conflict());

        let stored = repo.get(job.id()).await.unwrap();
        assert_eq!(stored.title.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_update_cannot_change_owner() {
        let repo = repo::<VlogJob>();
        let mut job = repo.create("alice", VlogJob::new("alice", VlogRequest::default())).await.unwrap();
        job.meta.owner_id = "mallory".into();

        let committed = repo.update(&job).await.unwrap();
        assert_eq!(committed.owner_id(), "alice");
    }

    #[tokio::test]
    async fn test_update_uncreated_record() {
        let repo = repo::<VlogJob>();
        let job = VlogJob::new("alice", VlogRequest::default());
        assert!(matches!(repo.update(&job).await, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = repo::<VlogJob>();
        assert!(matches!(repo.get("nope").await, Err(StoreError::NotFound(_))));
        assert!(repo.find("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_modify_skips_when_mutation_declines() {
        let repo = repo::<VlogJob>();
        let job = repo.create("alice", VlogJob::new("alice", VlogRequest::default())).await.unwrap();

        let result = repo.modify(job.id(), 2, |_| false).await.unwrap();
        assert!(result.is_none());
        assert_eq!(repo.get(job.id()).await.unwrap().version(), 1);
    }

    #[tokio::test]
    async fn test_modify_applies_on_fresh_read() {
        let repo = repo::<VlogJob>();
        let job = repo.create("alice", VlogJob::new("alice", VlogRequest::default())).await.unwrap();

        let updated = repo
            .modify(job.id(), 2, |j| j.state.begin(JobStatus::Processing, 0.1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.state.status, JobStatus::Processing);
        assert_eq!(updated.version(), 2);
    }

    /// Backend whose stored version always moves ahead of the caller.
    struct AlwaysContended(MemoryBackend);

    #[async_trait::async_trait]
    impl DocumentBackend for AlwaysContended {
        async fn insert(&self, collection: &str, id: &str, doc: JsonMap) -> StoreResult<()> {
            self.0.insert(collection, id, doc).await
        }

        async fn fetch(&self, collection: &str, id: &str) -> StoreResult<Option<JsonMap>> {
            self.0.fetch(collection, id).await
        }

        async fn compare_and_swap(
            &self,
            _collection: &str,
            _id: &str,
            _expected_version: u64,
            _doc: JsonMap,
        ) -> StoreResult<Option<JsonMap>> {
            Ok(None)
        }

        fn name(&self) -> &'static str {
            "contended"
        }
    }

    #[tokio::test]
    async fn test_modify_exhausts_under_constant_contention() {
        let repo: Repository<VlogJob> = Repository::new(Arc::new(AlwaysContended(MemoryBackend::new())));
        let job = repo.create("alice", VlogJob::new("alice", VlogRequest::default())).await.unwrap();

        let mut calls = 0;
        let err = repo
            .modify(job.id(), 2, |j| {
                calls += 1;
                j.state.advance(0.5)
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 2);
        assert!(matches!(
            err,
            StoreError::ConcurrentUpdateExhausted { attempts: 2, .. }
        ));
    }
}
