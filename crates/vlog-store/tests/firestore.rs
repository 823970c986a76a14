//! Firestore integration tests. Run against the emulator
//! (`FIRESTORE_EMULATOR_HOST`) or a test project.

use std::sync::Arc;

use vlog_models::{Entity, MediaJob};
use vlog_store::{FirestoreBackend, Repository, StoreError};

async fn repository() -> Repository<MediaJob> {
    let backend = FirestoreBackend::from_env().await.unwrap();
    Repository::new(Arc::new(backend))
}

#[tokio::test]
#[ignore = "requires Firestore or its emulator"]
async fn test_create_assigns_identity() {
    let repo = repository().await;

    let created = repo
        .create("integration", MediaJob::uploading("", "a.jpg", "image/jpeg", 3))
        .await
        .unwrap();
    assert!(!created.id().is_empty());
    assert_eq!(created.version(), 1);
    assert_eq!(created.owner_id(), "integration");

    let fetched = repo.get(created.id()).await.unwrap();
    assert_eq!(fetched.file_name, "a.jpg");
    assert!(repo.find("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Firestore or its emulator"]
async fn test_stale_update_conflicts() {
    let repo = repository().await;
    let created = repo
        .create("integration", MediaJob::uploading("", "b.jpg", "image/jpeg", 3))
        .await
        .unwrap();

    let mut first = created.clone();
    first.size = 10;
    let committed = repo.update(&first).await.unwrap();
    assert_eq!(committed.version(), 2);

    let mut second = created;
    second.size = 20;
    let err = repo.update(&second).await.unwrap_err();
    assert!(matches!(err, StoreError::OptimisticLockConflict { .. }));

    assert_eq!(repo.get(committed.id()).await.unwrap().size, 10);
}
