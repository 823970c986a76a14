//! Job status machine shared by vlog and media jobs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Job processing status.
///
/// Vlog jobs use `Pending → Processing → {Completed, Failed}`. Media jobs
/// additionally pass through `Uploading` before `Pending` and use
/// `Analyzing` in place of `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Bytes are still being written to storage
    Uploading,
    /// Created, waiting for a worker
    #[default]
    Pending,
    /// Pipeline is running
    Processing,
    /// Media analysis is running
    Analyzing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploading => "uploading",
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Uploading => 0,
            JobStatus::Pending => 1,
            JobStatus::Processing | JobStatus::Analyzing => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    ///
    /// Staying in the same non-terminal status is allowed (progress updates).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status, progress and timing fields shared by all tracked jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    pub status: JobStatus,
    /// Fraction complete in [0.0, 1.0]
    pub progress: f64,
    /// Present only when status is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::with_status(JobStatus::Pending)
    }
}

impl JobProgress {
    /// Fresh progress state in the given initial status.
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            progress: 0.0,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Enter a working status (`Processing` or `Analyzing`).
    ///
    /// Sets `started_at` on first entry and clears any error message.
    /// Returns false when the transition would regress.
    pub fn begin(&mut self, status: JobStatus, progress: f64) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        self.error_message = None;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.progress = self.progress.max(clamp_progress(progress));
        true
    }

    /// Move to another non-terminal status without touching timing fields.
    pub fn move_to(&mut self, status: JobStatus, progress: f64) -> bool {
        if status.is_terminal() || !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        self.progress = self.progress.max(clamp_progress(progress));
        true
    }

    /// Raise progress. Returns false if the job is terminal or the value
    /// would not move progress forward.
    pub fn advance(&mut self, progress: f64) -> bool {
        let progress = clamp_progress(progress);
        if self.status.is_terminal() || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    /// Mark as completed.
    pub fn complete(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.error_message = None;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Mark as failed with a human-readable message.
    pub fn fail(&mut self, message: impl Into<String>, progress: f64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.progress = clamp_progress(progress);
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
        true
    }

    /// True if the job entered a working status less than `window` ago.
    ///
    /// A `started_at` ahead of the local clock counts as recent.
    pub fn started_within(&self, window: std::time::Duration) -> bool {
        let Some(started_at) = self.started_at else {
            return false;
        };
        match Utc::now().signed_duration_since(started_at).to_std() {
            Ok(elapsed) => elapsed < window,
            Err(_) => true,
        }
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}
