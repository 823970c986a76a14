//! Pipeline error types.

use thiserror::Error;

use vlog_ai::AiError;
use vlog_queue::QueueError;
use vlog_storage::StorageError;
use vlog_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Optimistic lock conflict: {0}")]
    OptimisticLockConflict(String),

    #[error("Concurrent update exhausted: {0}")]
    ConcurrentUpdateExhausted(String),

    #[error("No usable media: all {0} items failed analysis")]
    NoUsableMedia(usize),

    #[error("Video generation timed out after {0}s")]
    GenerationTimeout(u64),

    #[error("Video generation failed: {0}")]
    GenerationFailed(String),

    #[error("Dispatch failed: {0}")]
    DispatchFailure(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job cancelled: {0}")]
    Cancelled(String),

    /// Another run holds the job; a later redelivery may resume it
    #[error("Job already running: {0}")]
    AlreadyRunning(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("AI service error: {0}")]
    Analyzer(#[from] AiError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => Self::NotFound(path),
            StoreError::Validation(msg) => Self::ValidationError(msg),
            e @ StoreError::OptimisticLockConflict { .. } => {
                Self::OptimisticLockConflict(e.to_string())
            }
            e @ StoreError::ConcurrentUpdateExhausted { .. } => {
                Self::ConcurrentUpdateExhausted(e.to_string())
            }
            other => Self::Store(other),
        }
    }
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn dispatch_failure(msg: impl Into<String>) -> Self {
        Self::DispatchFailure(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Check if re-running the task may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Store(e) => e.is_retryable(),
            PipelineError::Analyzer(e) => e.is_retryable(),
            PipelineError::Storage(_)
            | PipelineError::Queue(_)
            | PipelineError::DispatchFailure(_)
            | PipelineError::ConcurrentUpdateExhausted(_)
            | PipelineError::AlreadyRunning(_) => true,
            _ => false,
        }
    }

    /// True if a conditional write lost to a concurrent writer.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            PipelineError::OptimisticLockConflict(_) | PipelineError::ConcurrentUpdateExhausted(_)
        )
    }

    /// Failures caused by the request itself; retrying cannot help.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_)
                | PipelineError::ValidationError(_)
                | PipelineError::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let conflict: PipelineError = StoreError::conflict("vlogs", "v1", 5).into();
        assert!(matches!(conflict, PipelineError::OptimisticLockConflict(_)));
        assert!(conflict.is_conflict());

        let missing: PipelineError = StoreError::not_found("vlogs/v1").into();
        assert!(matches!(missing, PipelineError::NotFound(_)));
        assert!(missing.is_client_error());

        let server: PipelineError = StoreError::ServerError(503, "busy".into()).into();
        assert!(matches!(server, PipelineError::Store(_)));
        assert!(server.is_retryable());
    }

    #[test]
    fn test_pipeline_failures_are_not_retryable() {
        assert!(!PipelineError::NoUsableMedia(3).is_retryable());
        assert!(!PipelineError::GenerationTimeout(120).is_retryable());
        assert!(!PipelineError::invalid_input("no media").is_retryable());
        assert!(PipelineError::dispatch_failure("redis down").is_retryable());
        assert!(PipelineError::AlreadyRunning("v1".into()).is_retryable());
    }

    #[test]
    fn test_messages_are_readable() {
        assert_eq!(
            PipelineError::GenerationTimeout(120).to_string(),
            "Video generation timed out after 120s"
        );
        assert_eq!(
            PipelineError::NoUsableMedia(2).to_string(),
            "No usable media: all 2 items failed analysis"
        );
    }
}
