//! Object storage seam used by the pipelines.

use async_trait::async_trait;

use crate::error::StorageResult;

/// Byte-level object storage.
///
/// `location` arguments accept anything [`crate::ObjectLocation::parse`]
/// understands; `key` arguments are keys in the default bucket.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`, returning the stored key.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String>;

    async fn download(&self, location: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, location: &str) -> StorageResult<()>;

    /// URL clients use to fetch `key`.
    fn public_url(&self, key: &str) -> String;
}
