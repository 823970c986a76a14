//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vlog_store::StoreError;
use vlog_worker::PipelineError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Pipeline error: {0}")]
    Pipeline(PipelineError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::Internal(_) | ApiError::Unavailable(_) | ApiError::Pipeline(_)
        )
    }
}

/// Maps the pipeline taxonomy onto HTTP semantics.
///
/// The queue relay treats 4xx (other than 408/429) as permanent, so only
/// failures a redelivery cannot fix become client errors.
impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(msg) | PipelineError::ValidationError(msg) => {
                Self::Validation(msg)
            }
            PipelineError::NotFound(msg) => Self::NotFound(msg),
            PipelineError::OptimisticLockConflict(msg) => Self::Conflict(msg),
            e @ (PipelineError::ConcurrentUpdateExhausted(_)
            | PipelineError::DispatchFailure(_)
            | PipelineError::Cancelled(_)) => Self::Unavailable(e.to_string()),
            other if other.is_retryable() => Self::Unavailable(other.to_string()),
            other => Self::Pipeline(other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        PipelineError::from(err).into()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let code = match &self {
            ApiError::Conflict(_) => Some("version_conflict"),
            ApiError::Validation(_) => Some("invalid_input"),
            _ => None,
        };

        (status, Json(ErrorResponse { detail, code })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_status_codes() {
        let cases = [
            (PipelineError::invalid_input("no media"), StatusCode::BAD_REQUEST),
            (PipelineError::not_found("vlogs/x"), StatusCode::NOT_FOUND),
            (
                PipelineError::OptimisticLockConflict("vlogs/x".into()),
                StatusCode::CONFLICT,
            ),
            (
                PipelineError::ConcurrentUpdateExhausted("vlogs/x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PipelineError::dispatch_failure("redis down"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PipelineError::AlreadyRunning("vlogs/x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (PipelineError::NoUsableMedia(3), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_store_not_found_maps_to_404() {
        let err = ApiError::from(StoreError::not_found("vlogs/abc"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
