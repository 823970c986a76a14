//! R2 / S3-compatible client.
//!
//! One client serves the durable bucket and, through explicit `s3://` or
//! `gs://` locations, the temporary bucket generation outputs land in.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::location::ObjectLocation;
use crate::storage::ObjectStorage;

#[derive(Debug, Clone)]
pub struct R2Config {
    /// S3 API endpoint
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Durable bucket for uploads and final videos
    pub bucket_name: String,
    /// Bucket generation outputs are written to before re-upload
    pub temp_bucket_name: Option<String>,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public URL prefix for the durable bucket
    pub public_url_base: Option<String>,
}

impl R2Config {
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            temp_bucket_name: std::env::var("TEMP_BUCKET_NAME").ok().filter(|b| !b.is_empty()),
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url_base: std::env::var("R2_PUBLIC_URL")
                .ok()
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
        })
    }
}

#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_url_base: Option<String>,
}

impl R2Client {
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_url_base: config.public_url_base,
        })
    }

    pub async fn from_env() -> StorageResult<Self> {
        Self::new(R2Config::from_env()?).await
    }

    fn locate(&self, location: &str) -> StorageResult<ObjectLocation> {
        ObjectLocation::parse(location, self.public_url_base.as_deref())
    }

    pub async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()> {
        debug!(key = %key, bytes = data.len(), "Uploading object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    pub async fn download_bytes(&self, location: &ObjectLocation) -> StorageResult<Vec<u8>> {
        let bucket = location.bucket_or(&self.bucket);
        debug!(bucket = %bucket, key = %location.key, "Downloading object");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(&location.key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        Ok(response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec())
    }

    pub async fn delete_object(&self, location: &ObjectLocation) -> StorageResult<()> {
        let bucket = location.bucket_or(&self.bucket);
        debug!(bucket = %bucket, key = %location.key, "Deleting object");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for R2Client {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
        self.upload_bytes(data, key, content_type).await?;
        info!(key = %key, "Uploaded object");
        Ok(key.to_string())
    }

    async fn download(&self, location: &str) -> StorageResult<Vec<u8>> {
        let location = self.locate(location)?;
        self.download_bytes(&location).await
    }

    async fn delete(&self, location: &str) -> StorageResult<()> {
        let location = self.locate(location)?;
        self.delete_object(&location).await
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_url_base {
            Some(base) => format!("{}/{}", base, key),
            None => format!("s3://{}/{}", self.bucket, key),
        }
    }
}
