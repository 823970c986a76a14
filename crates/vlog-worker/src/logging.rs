//! Structured job logging.
//!
//! Every pipeline logs through a [`JobLogger`] so lifecycle events carry
//! the same `job_id`, `owner_id` and `operation` fields.

use tracing::{error, info, warn, Span};

/// Job logger with fixed context fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    owner_id: String,
    operation: &'static str,
}

impl JobLogger {
    /// * `operation` - pipeline name, e.g. `generate_vlog`, `analyze_media`
    pub fn new(job_id: &str, owner_id: &str, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            owner_id: owner_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            owner_id = %self.owner_id,
            operation = self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            owner_id = %self.owner_id,
            operation = self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            owner_id = %self.owner_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            owner_id = %self.owner_id,
            operation = self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            owner_id = %self.owner_id,
            operation = self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Span for instrumenting the whole pipeline future.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            owner_id = %self.owner_id,
            operation = self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let logger = JobLogger::new("vlog-123", "u1", "generate_vlog");

        assert_eq!(logger.job_id(), "vlog-123");
        assert_eq!(logger.owner_id(), "u1");
        assert_eq!(logger.operation(), "generate_vlog");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = JobLogger::new("m1", "u1", "analyze_media");
        let _guard = logger.create_span().entered();
        logger.log_start("3 items");
        logger.log_warning("item 2 failed");
        logger.log_completion("done");
    }
}
