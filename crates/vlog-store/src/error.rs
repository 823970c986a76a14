//! Entity store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The stored version no longer matches the version the caller read.
    #[error("Optimistic lock conflict on {collection}/{id} (expected version {expected})")]
    OptimisticLockConflict {
        collection: String,
        id: String,
        expected: u64,
    },

    #[error("Concurrent update on {collection}/{id} still conflicting after {attempts} attempts")]
    ConcurrentUpdateExhausted {
        collection: String,
        id: String,
        attempts: u32,
    },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn conflict(collection: &str, id: &str, expected: u64) -> Self {
        Self::OptimisticLockConflict {
            collection: collection.to_string(),
            id: id.to_string(),
            expected,
        }
    }

    /// Map an HTTP status from the document API to an error.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            401 => Self::AuthError(msg),
            403 => Self::PermissionDenied(msg),
            404 => Self::NotFound(msg),
            409 => Self::AlreadyExists(msg),
            412 => Self::PreconditionFailed(msg),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, msg),
            _ => Self::RequestFailed(msg),
        }
    }

    /// HTTP status equivalent, used for request metrics.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) | Self::OptimisticLockConflict { .. } => Some(409),
            Self::PreconditionFailed(_) => Some(412),
            Self::RateLimited(_) => Some(429),
            Self::ServerError(code, _) => Some(*code),
            Self::RequestFailed(_) | Self::Validation(_) => Some(400),
            _ => None,
        }
    }

    /// Server-suggested delay before retrying.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable at the transport level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_) | StoreError::RateLimited(_) | StoreError::ServerError(..)
        )
    }

    /// True if the write lost an optimistic-lock race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::OptimisticLockConflict { .. })
    }

    /// True if the error was caused by a failed precondition (e.g., updateTime mismatch).
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, StoreError::PreconditionFailed(_))
            || matches!(
                self,
                StoreError::RequestFailed(msg)
                if msg.contains("FAILED_PRECONDITION") || msg.contains("Precondition")
            )
    }
}
