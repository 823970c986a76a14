//! Firestore REST API client.
//!
//! - Token caching with refresh margin, one re-send after an expired token
//! - HTTP client tuning (pooling, timeouts)
//! - Transport retry with backoff
//! - Tracing spans and request metrics per call
//! - Emulator mode via `FIRESTORE_EMULATOR_HOST`

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token_cache::TokenCache;
use crate::types::{Document, Value};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
    /// `host:port` of a local emulator; disables real authentication
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    pub fn from_env() -> StoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                StoreError::auth_error("GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set")
            })?;

        if project_id.is_empty() {
            return Err(StoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
        })
    }

    /// Config pointing at an emulator, used by local runs and tests.
    pub fn emulator(project_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig::default(),
            emulator_host: Some(host.into()),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    pub async fn new(config: FirestoreConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vlog-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        let (origin, token_cache) = match &config.emulator_host {
            Some(host) => {
                debug!(host = %host, "Using Firestore emulator");
                (format!("http://{}", host), TokenCache::fixed("owner"))
            }
            None => (
                "https://firestore.googleapis.com".to_string(),
                TokenCache::new(Self::create_auth_provider()?),
            ),
        };

        let base_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            origin, config.project_id, config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(token_cache),
        })
    }

    fn create_auth_provider() -> StoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            StoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(StoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    pub async fn from_env() -> StoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.execute_request("get_document", collection, doc_id, || async {
            let response = self.send_authorized(|| self.http.get(&url)).await?;
            match response.status() {
                StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document; fails with `AlreadyExists` if the id is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> StoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, doc_id, || async {
            let response = self
                .send_authorized(|| self.http.post(&url).json(&body))
                .await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json::<Document>().await?),
                StatusCode::CONFLICT => Err(StoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Replace a document's fields only if it was last written at `update_time`.
    ///
    /// A failed precondition surfaces as `PreconditionFailed`.
    pub async fn update_document_with_precondition(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_time: &str,
    ) -> StoreResult<Document> {
        let url = format!(
            "{}?currentDocument.updateTime={}",
            self.document_path(collection, doc_id),
            urlencoding::encode(update_time)
        );
        let body = Document::new(fields);

        self.execute_request("update_document_precondition", collection, doc_id, || async {
            let response = self
                .send_authorized(|| self.http.patch(&url).json(&body))
                .await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Document>().await?),
                StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                    let body_text = response.text().await.unwrap_or_default();
                    Err(StoreError::PreconditionFailed(body_text))
                }
                StatusCode::NOT_FOUND => Err(StoreError::not_found(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Send with a bearer token, re-sending once if the token had expired.
    async fn send_authorized<B>(&self, build: B) -> StoreResult<Response>
    where
        B: Fn() -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build().bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !is_access_token_expired(&body) {
            return Err(StoreError::from_http_status(401, body));
        }

        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build().bearer_auth(&token).send().await?)
    }

    /// Run a request with retry, tracing and metrics.
    async fn execute_request<T, F, Fut>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: &str,
        op: F,
    ) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let span = info_span!(
            "firestore_request",
            operation = %operation,
            collection = %collection,
            doc_id = %doc_id
        );

        let start = Instant::now();
        let result = with_retry(&self.config.retry, operation, op)
            .instrument(span)
            .await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> StoreError {
        let body = response.text().await.unwrap_or_default();
        StoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

fn is_access_token_expired(body: &str) -> bool {
    body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
}
