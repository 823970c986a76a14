//! AI client error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable ({0}): {1}")]
    ServiceUnavailable(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::AuthError(body),
            429 => Self::RateLimited,
            500..=599 => Self::ServiceUnavailable(status, body),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::RateLimited | AiError::ServiceUnavailable(..) | AiError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(AiError::from_http_status(403, ""), AiError::AuthError(_)));
        assert!(AiError::from_http_status(429, "").is_retryable());
        assert!(AiError::from_http_status(503, "").is_retryable());
        assert!(!AiError::from_http_status(400, "bad prompt").is_retryable());
    }
}
