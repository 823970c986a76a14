//! HTTP contract tests for the AI clients.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vlog_ai::{
    AiError, GeminiAnalyzer, GeminiConfig, GenerationRequest, MediaAnalyzer, OperationHandle,
    VeoClient, VeoConfig, VideoGenerator,
};
use vlog_models::{MediaItem, MediaKind};

fn gemini(server: &MockServer) -> GeminiAnalyzer {
    GeminiAnalyzer::new(GeminiConfig {
        api_key: "test-key".into(),
        base_url: format!("{}/v1beta", server.uri()),
        timeout: Duration::from_secs(5),
        max_retries: 1,
        ..Default::default()
    })
    .unwrap()
}

async fn veo(server: &MockServer) -> VeoClient {
    let mut config = VeoConfig::new("proj", "scratch");
    config.base_url = format!("{}/v1", server.uri());
    config.access_token = Some("token".into());
    VeoClient::new(config).await.unwrap()
}

fn photo() -> MediaItem {
    MediaItem {
        file_id: "m1".into(),
        url: "users/u1/media/m1.jpg".into(),
        kind: MediaKind::Image,
        content_type: Some("image/jpeg".into()),
        timestamp: None,
        order: 0,
    }
}

const MODEL_PATH: &str =
    "/v1/projects/proj/locations/us-central1/publishers/google/models/veo-3.1-fast-generate-001";

#[tokio::test]
async fn test_gemini_sends_inline_media_and_parses_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text":
                "{\"description\":\"Sunset at the pier\",\"landmarks\":[\"Santa Monica Pier\"],\"activities\":[\"walking\"],\"mood\":\"calm\",\"suggested_caption\":\"Golden hour\"}"
            }]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let analysis = gemini(&server).analyze(&photo(), vec![0xFF, 0xD8, 0xFF]).await.unwrap();
    assert_eq!(analysis.file_id, "m1");
    assert_eq!(analysis.kind, MediaKind::Image);
    assert_eq!(analysis.landmarks, vec!["Santa Monica Pier"]);
    assert_eq!(analysis.suggested_caption, "Golden hour");
}

#[tokio::test]
async fn test_gemini_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported mime"))
        .expect(1)
        .mount(&server)
        .await;

    let err = gemini(&server).analyze(&photo(), vec![1]).await.unwrap_err();
    assert!(matches!(err, AiError::RequestFailed(_)));
}

#[tokio::test]
async fn test_gemini_rejects_empty_media() {
    let server = MockServer::start().await;
    let err = gemini(&server).analyze(&photo(), Vec::new()).await.unwrap_err();
    assert!(matches!(err, AiError::RequestFailed(_)));
}

#[tokio::test]
async fn test_veo_submit_targets_job_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:predictLongRunning", MODEL_PATH)))
        .and(header("authorization", "Bearer token"))
        .and(body_partial_json(json!({
            "parameters": {
                "durationSeconds": 6,
                "aspectRatio": "9:16",
                "storageUri": "gs://scratch/temp/job-1/"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operations/abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let handle = veo(&server)
        .await
        .submit(&GenerationRequest {
            prompt: "beach".into(),
            duration_secs: 6,
            aspect_ratio: "9:16".into(),
            job_id: "job-1".into(),
        })
        .await
        .unwrap();
    assert_eq!(handle.name, "operations/abc");
}

#[tokio::test]
async fn test_veo_poll_reports_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
        .and(body_partial_json(json!({"operationName": "operations/abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/abc",
            "done": true,
            "response": {"videos": [{"gcsUri": "gs://scratch/temp/job-1/sample_0.mp4"}]}
        })))
        .mount(&server)
        .await;

    let status = veo(&server)
        .await
        .poll(&OperationHandle {
            name: "operations/abc".into(),
        })
        .await
        .unwrap();
    assert!(status.done);
    assert_eq!(
        status.output_location.as_deref(),
        Some("gs://scratch/temp/job-1/sample_0.mp4")
    );
}

#[tokio::test]
async fn test_veo_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    let err = veo(&server)
        .await
        .poll(&OperationHandle { name: "op".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::AuthError(_)));
}
