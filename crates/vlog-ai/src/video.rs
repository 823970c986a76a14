//! Long-running video generation.
//!
//! [`VeoClient`] talks to the Vertex AI `predictLongRunning` and
//! `fetchPredictOperation` endpoints. Outputs are written to a temporary
//! `gs://` prefix per job; callers move them to durable storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AiError, AiResult};

/// Durations the generation model accepts, in seconds.
pub const SUPPORTED_DURATIONS: [u32; 3] = [4, 6, 8];

pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Snap a requested duration onto [`SUPPORTED_DURATIONS`].
///
/// Zero or unset uses `default`, and a zero default uses the largest step.
/// Values between supported steps round up; anything above the largest
/// step clamps to it.
pub fn snap_duration(requested: Option<u32>, default: u32) -> u32 {
    let max = SUPPORTED_DURATIONS[SUPPORTED_DURATIONS.len() - 1];
    let secs = match requested.filter(|&secs| secs > 0) {
        Some(secs) => secs,
        None if default > 0 => default,
        None => max,
    };
    SUPPORTED_DURATIONS
        .iter()
        .copied()
        .find(|&d| d >= secs)
        .unwrap_or(max)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Already snapped to a supported value
    pub duration_secs: u32,
    pub aspect_ratio: String,
    /// Job the output belongs to; names the temporary output prefix
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStatus {
    pub done: bool,
    /// First generated output, when done without error
    pub output_location: Option<String>,
    /// Remote error message, when done with error
    pub error: Option<String>,
}

/// Submit-and-poll video generation service.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn submit(&self, request: &GenerationRequest) -> AiResult<OperationHandle>;

    async fn poll(&self, handle: &OperationHandle) -> AiResult<OperationStatus>;
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct VeoConfig {
    pub project_id: String,
    pub location: String,
    pub model: String,
    /// API root; defaults to the regional Vertex AI endpoint
    pub base_url: String,
    /// Bucket for temporary outputs (`gs://{bucket}/temp/{job_id}/`)
    pub output_bucket: String,
    pub timeout: Duration,
    /// Fixed bearer token, bypassing service-account auth
    pub access_token: Option<String>,
}

impl VeoConfig {
    pub fn new(project_id: impl Into<String>, output_bucket: impl Into<String>) -> Self {
        let location = "us-central1".to_string();
        Self {
            project_id: project_id.into(),
            base_url: format!("https://{}-aiplatform.googleapis.com/v1", location),
            location,
            model: "veo-3.1-fast-generate-001".to_string(),
            output_bucket: output_bucket.into(),
            timeout: Duration::from_secs(60),
            access_token: None,
        }
    }

    pub fn from_env() -> AiResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .map_err(|_| AiError::config_error("GCP_PROJECT_ID not set"))?;
        let location = std::env::var("VERTEX_LOCATION").unwrap_or_else(|_| "us-central1".to_string());

        Ok(Self {
            base_url: std::env::var("VERTEX_BASE_URL")
                .unwrap_or_else(|_| format!("https://{}-aiplatform.googleapis.com/v1", location)),
            location,
            model: std::env::var("VEO_MODEL")
                .unwrap_or_else(|_| "veo-3.1-fast-generate-001".to_string()),
            output_bucket: std::env::var("TEMP_BUCKET_NAME")
                .unwrap_or_else(|_| "tavinikkiy-temp".to_string()),
            timeout: Duration::from_secs(
                std::env::var("VERTEX_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            access_token: std::env::var("VERTEX_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
            project_id,
        })
    }

    fn model_path(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.location,
            self.model
        )
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchOperationRequest<'a> {
    operation_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<RemoteError>,
    #[serde(default)]
    response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    videos: Vec<GeneratedVideo>,
    #[serde(default)]
    rai_media_filtered_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedVideo {
    gcs_uri: Option<String>,
}

impl From<OperationResponse> for OperationStatus {
    fn from(op: OperationResponse) -> Self {
        if !op.done {
            return OperationStatus::default();
        }
        if let Some(err) = op.error {
            return OperationStatus {
                done: true,
                output_location: None,
                error: Some(format!("{} (code {})", err.message, err.code)),
            };
        }

        let response = op.response;
        let output = response
            .as_ref()
            .and_then(|r| r.videos.iter().find_map(|v| v.gcs_uri.clone()));
        let error = match (&output, &response) {
            (Some(_), _) => None,
            (None, Some(r)) if r.rai_media_filtered_count > 0 => {
                Some(format!("{} output(s) filtered by safety policy", r.rai_media_filtered_count))
            }
            (None, _) => Some("no video generated".to_string()),
        };

        OperationStatus {
            done: true,
            output_location: output,
            error,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

enum Bearer {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

pub struct VeoClient {
    http: Client,
    config: VeoConfig,
    bearer: Bearer,
}

impl VeoClient {
    pub async fn new(config: VeoConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;

        let bearer = match &config.access_token {
            Some(token) => Bearer::Static(token.clone()),
            None => Bearer::Provider(
                gcp_auth::provider()
                    .await
                    .map_err(|e| AiError::AuthError(format!("No GCP credentials: {}", e)))?,
            ),
        };

        Ok(Self { http, config, bearer })
    }

    pub async fn from_env() -> AiResult<Self> {
        Self::new(VeoConfig::from_env()?).await
    }

    async fn token(&self) -> AiResult<String> {
        match &self.bearer {
            Bearer::Static(token) => Ok(token.clone()),
            Bearer::Provider(provider) => provider
                .token(&[CLOUD_PLATFORM_SCOPE])
                .await
                .map(|t| t.as_str().to_string())
                .map_err(|e| AiError::AuthError(e.to_string())),
        }
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> AiResult<R>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let token = self.token().await?;
        let response = self.http.post(url).bearer_auth(token).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::from_http_status(status, text));
        }
        Ok(response.json().await?)
    }

    fn output_uri(&self, job_id: &str) -> String {
        format!("gs://{}/temp/{}/", self.config.output_bucket, job_id)
    }
}

#[async_trait]
impl VideoGenerator for VeoClient {
    async fn submit(&self, request: &GenerationRequest) -> AiResult<OperationHandle> {
        let url = format!("{}:predictLongRunning", self.config.model_path());
        let body = json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": {
                "durationSeconds": request.duration_secs,
                "aspectRatio": request.aspect_ratio,
                "resolution": "720p",
                "sampleCount": 1,
                "storageUri": self.output_uri(&request.job_id),
                "generateAudio": true,
                "personGeneration": "allow_adult"
            }
        });

        let submitted: SubmitResponse = self.post_json(&url, &body).await?;
        info!(
            job_id = %request.job_id,
            operation = %submitted.name,
            duration_secs = request.duration_secs,
            "Video generation submitted"
        );
        Ok(OperationHandle {
            name: submitted.name,
        })
    }

    async fn poll(&self, handle: &OperationHandle) -> AiResult<OperationStatus> {
        let url = format!("{}:fetchPredictOperation", self.config.model_path());
        let op: OperationResponse = self
            .post_json(
                &url,
                &FetchOperationRequest {
                    operation_name: &handle.name,
                },
            )
            .await?;

        debug!(operation = %handle.name, done = op.done, "Polled generation operation");
        Ok(op.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_duration() {
        assert_eq!(snap_duration(None, 8), 8);
        assert_eq!(snap_duration(Some(0), 8), 8);
        assert_eq!(snap_duration(Some(1), 8), 4);
        assert_eq!(snap_duration(Some(4), 8), 4);
        assert_eq!(snap_duration(Some(5), 8), 6);
        assert_eq!(snap_duration(Some(7), 8), 8);
        assert_eq!(snap_duration(Some(60), 8), 8);
    }

    #[test]
    fn test_snap_duration_snaps_configured_default() {
        assert_eq!(snap_duration(None, 5), 6);
        assert_eq!(snap_duration(Some(0), 3), 4);
        assert_eq!(snap_duration(None, 0), 8);
        assert_eq!(snap_duration(None, 30), 8);
        for default in 0..=12 {
            assert!(SUPPORTED_DURATIONS.contains(&snap_duration(None, default)));
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = VeoConfig::new("proj", "veo-tmp");
        assert_eq!(config.model, "veo-3.1-fast-generate-001");
        assert_eq!(config.base_url, "https://us-central1-aiplatform.googleapis.com/v1");
        assert!(config.model_path().ends_with("/models/veo-3.1-fast-generate-001"));
    }

    #[test]
    fn test_pending_operation() {
        let op: OperationResponse = serde_json::from_value(json!({"name": "op"})).unwrap();
        assert_eq!(OperationStatus::from(op), OperationStatus::default());
    }

    #[test]
    fn test_done_with_output() {
        let op: OperationResponse = serde_json::from_value(json!({
            "done": true,
            "response": {"videos": [{"gcsUri": "gs://tmp/temp/j1/sample_0.mp4", "mimeType": "video/mp4"}]}
        }))
        .unwrap();
        let status = OperationStatus::from(op);
        assert!(status.done);
        assert_eq!(status.output_location.as_deref(), Some("gs://tmp/temp/j1/sample_0.mp4"));
        assert!(status.error.is_none());
    }

    #[test]
    fn test_done_without_outputs_is_an_error() {
        let op: OperationResponse = serde_json::from_value(json!({
            "done": true,
            "response": {"videos": [], "raiMediaFilteredCount": 1}
        }))
        .unwrap();
        let status = OperationStatus::from(op);
        assert!(status.output_location.is_none());
        assert!(status.error.unwrap().contains("filtered"));
    }

    #[test]
    fn test_done_with_remote_error() {
        let op: OperationResponse = serde_json::from_value(json!({
            "done": true,
            "error": {"code": 3, "message": "prompt rejected"}
        }))
        .unwrap();
        assert_eq!(OperationStatus::from(op).error.as_deref(), Some("prompt rejected (code 3)"));
    }
}
