//! HTTP-level tests for the Firestore client and backend against a mock
//! emulator.

use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::backend::{DocumentBackend, JsonMap};
use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::StoreError;
use crate::firestore::FirestoreBackend;
use crate::retry::RetryConfig;

const DOC_PATH: &str = "/v1/projects/test-project/databases/(default)/documents/vlogs/v1";
const UPDATE_TIME: &str = "2024-05-01T10:00:00.123456Z";

async fn client_for(server: &MockServer) -> FirestoreClient {
    let mut config = FirestoreConfig::emulator("test-project", server.address().to_string());
    config.retry = RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    FirestoreClient::new(config).await.unwrap()
}

fn stored_doc(version: u64) -> serde_json::Value {
    json!({
        "name": "projects/test-project/databases/(default)/documents/vlogs/v1",
        "fields": {
            "id": {"stringValue": "v1"},
            "owner_id": {"stringValue": "alice"},
            "created_at": {"stringValue": "2024-05-01T09:00:00Z"},
            "version": {"integerValue": version.to_string()},
            "status": {"stringValue": "processing"}
        },
        "updateTime": UPDATE_TIME
    })
}

fn incoming(version: u64) -> JsonMap {
    let serde_json::Value::Object(map) = json!({
        "id": "v1",
        "owner_id": "mallory",
        "created_at": "2030-01-01T00:00:00Z",
        "version": version,
        "status": "completed"
    }) else {
        unreachable!()
    };
    map
}

// =============================================================================
// Client
// =============================================================================

#[tokio::test]
async fn test_get_missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(client.get_document("vlogs", "v1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_conflict_maps_to_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/projects/test-project/databases/(default)/documents/vlogs"))
        .and(query_param("documentId", "v1"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .create_document("vlogs", "v1", Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc(2)))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = client.get_document("vlogs", "v1").await.unwrap().unwrap();
    assert_eq!(doc.to_json()["version"], 2);
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get_document("vlogs", "v1").await.unwrap_err();
    assert!(matches!(err, StoreError::RequestFailed(_)));
}

// =============================================================================
// Conditional writes
// =============================================================================

#[tokio::test]
async fn test_cas_writes_with_update_time_precondition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc(3)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .and(query_param("currentDocument.updateTime", UPDATE_TIME))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc(4)))
        .expect(1)
        .mount(&server)
        .await;

    let backend = FirestoreBackend::new(client_for(&server).await);
    let committed = backend
        .compare_and_swap("vlogs", "v1", 3, incoming(4))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(committed["version"], 4);
    assert_eq!(committed["status"], "completed");
    assert_eq!(committed["owner_id"], "alice");
    assert_eq!(committed["created_at"], "2024-05-01T09:00:00Z");
}

#[tokio::test]
async fn test_cas_version_mismatch_skips_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc(6)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let backend = FirestoreBackend::new(client_for(&server).await);
    let result = backend
        .compare_and_swap("vlogs", "v1", 5, incoming(6))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_cas_lost_precondition_is_a_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc(3)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(412).set_body_string("FAILED_PRECONDITION"))
        .mount(&server)
        .await;

    let backend = FirestoreBackend::new(client_for(&server).await);
    let result = backend
        .compare_and_swap("vlogs", "v1", 3, incoming(4))
        .await
        .unwrap();
    assert!(result.is_none());
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_error_status_mapping() {
    assert!(matches!(
        StoreError::from_http_status(412, "x"),
        StoreError::PreconditionFailed(_)
    ));
    assert!(StoreError::from_http_status(503, "x").is_retryable());
    assert!(StoreError::from_http_status(429, "x").is_retryable());
    assert!(!StoreError::from_http_status(404, "x").is_retryable());
    assert_eq!(StoreError::conflict("vlogs", "v1", 2).http_status(), Some(409));
}

// =============================================================================
// Config
// =============================================================================

#[test]
#[serial]
fn test_config_requires_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    assert!(FirestoreConfig::from_env().is_err());
}

#[test]
#[serial]
fn test_config_prefers_gcp_project_id() {
    std::env::set_var("GCP_PROJECT_ID", "gcp-project");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "gcp-project");
    std::env::remove_var("FIREBASE_PROJECT_ID");
}

#[test]
#[serial]
fn test_config_reads_emulator_host() {
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.emulator_host.as_deref(), Some("localhost:8080"));
    std::env::remove_var("FIRESTORE_EMULATOR_HOST");
}
