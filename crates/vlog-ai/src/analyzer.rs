//! Scene analysis of a single photo or video.
//!
//! [`GeminiAnalyzer`] sends the media inline (base64) to the
//! `generateContent` endpoint with JSON response mode and parses the
//! returned object into a [`MediaAnalysis`].

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vlog_models::{MediaAnalysis, MediaItem, MediaKind};

use crate::error::{AiError, AiResult};
use crate::prompt::build_analysis_prompt;
use crate::retry::with_retry;

/// Analyzes one media item's bytes.
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    async fn analyze(&self, item: &MediaItem, data: Vec<u8>) -> AiResult<MediaAnalysis>;
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> AiResult<Self> {
        let defaults = Self::default();
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AiError::config_error("GEMINI_API_KEY not set"))?;

        Ok(Self {
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(
                std::env::var("GEMINI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("GEMINI_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        })
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

pub struct GeminiAnalyzer {
    http: Client,
    config: GeminiConfig,
}

impl GeminiAnalyzer {
    pub fn new(config: GeminiConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AiResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    async fn generate(&self, request: &GenerateContentRequest) -> AiResult<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_http_status(status, body));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| AiError::invalid_response("No content in Gemini response"))
    }
}

#[async_trait]
impl MediaAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, item: &MediaItem, data: Vec<u8>) -> AiResult<MediaAnalysis> {
        if data.is_empty() {
            return Err(AiError::request_failed(format!("{} has no content", item.file_id)));
        }

        let mime_type = resolve_mime_type(item);
        debug!(
            file_id = %item.file_id,
            mime_type = %mime_type,
            bytes = data.len(),
            "Analyzing media"
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text(build_analysis_prompt(item.kind)),
                    Part::InlineData(InlineData {
                        mime_type,
                        data: BASE64.encode(&data),
                    }),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let text = with_retry(self.config.max_retries, Duration::from_millis(500), || {
            self.generate(&request)
        })
        .await?;

        let mut analysis = parse_analysis(&text)?;
        analysis.file_id = item.file_id.clone();
        analysis.kind = item.kind;

        info!(file_id = %item.file_id, mood = %analysis.mood, "Media analyzed");
        Ok(analysis)
    }
}

fn resolve_mime_type(item: &MediaItem) -> String {
    item.content_type
        .clone()
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or_else(|| match item.kind {
            MediaKind::Image => "image/jpeg".to_string(),
            MediaKind::Video => "video/mp4".to_string(),
        })
}

/// Parse the model's JSON, tolerating a surrounding markdown code fence.
pub(crate) fn parse_analysis(text: &str) -> AiResult<MediaAnalysis> {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);

    serde_json::from_str(text.trim())
        .map_err(|e| AiError::invalid_response(format!("Failed to parse analysis JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"description\":\"Beach\",\"mood\":\"calm\",\"landmarks\":[\"Waikiki\"]}\n```";
        let analysis = parse_analysis(text).unwrap();
        assert_eq!(analysis.description, "Beach");
        assert_eq!(analysis.landmarks, vec!["Waikiki"]);
        assert!(analysis.activities.is_empty());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_analysis("I could not analyze this image"),
            Err(AiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_mime_type_fallback() {
        let mut item = MediaItem {
            file_id: "f1".into(),
            url: "a".into(),
            kind: MediaKind::Video,
            content_type: None,
            timestamp: None,
            order: 0,
        };
        assert_eq!(resolve_mime_type(&item), "video/mp4");
        item.content_type = Some("video/quicktime".into());
        assert_eq!(resolve_mime_type(&item), "video/quicktime");
    }

    #[test]
    fn test_inline_part_wire_shape() {
        let part = Part::InlineData(InlineData {
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        });
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            serde_json::json!({"inlineData": {"mimeType": "image/png", "data": "AAAA"}})
        );
    }
}
