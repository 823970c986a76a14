//! In-process object storage for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::location::ObjectLocation;
use crate::storage::ObjectStorage;

const DEFAULT_BUCKET: &str = "local";

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object at any location, e.g. a temporary generation output.
    pub async fn put(&self, location: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let key = Self::resolve(location)?;
        self.objects.write().await.insert(
            key,
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    pub async fn get(&self, location: &str) -> Option<StoredObject> {
        let key = Self::resolve(location).ok()?;
        self.objects.read().await.get(&key).cloned()
    }

    pub async fn contains(&self, location: &str) -> bool {
        self.get(location).await.is_some()
    }

    fn resolve(location: &str) -> StorageResult<(String, String)> {
        let loc = ObjectLocation::parse(location, Some("memory://local"))?;
        Ok((loc.bucket_or(DEFAULT_BUCKET).to_string(), loc.key))
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
        self.put(key, data, content_type).await?;
        Ok(key.to_string())
    }

    async fn download(&self, location: &str) -> StorageResult<Vec<u8>> {
        self.get(location)
            .await
            .map(|o| o.data)
            .ok_or_else(|| StorageError::not_found(location))
    }

    async fn delete(&self, location: &str) -> StorageResult<()> {
        let key = Self::resolve(location)?;
        self.objects.write().await.remove(&key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://local/{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_public_url_round_trips_to_download() {
        let storage = MemoryObjectStorage::new();
        let key = storage.upload("users/u1/a.jpg", vec![1, 2, 3], "image/jpeg").await.unwrap();
        let url = storage.public_url(&key);

        assert_eq!(storage.download(&url).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(storage.get(&key).await.unwrap().content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_explicit_bucket_is_separate() {
        let storage = MemoryObjectStorage::new();
        storage.put("gs://temp/out.mp4", vec![9], "video/mp4").await.unwrap();

        assert!(storage.contains("gs://temp/out.mp4").await);
        assert!(!storage.contains("out.mp4").await);

        storage.delete("gs://temp/out.mp4").await.unwrap();
        assert!(matches!(
            storage.download("gs://temp/out.mp4").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
