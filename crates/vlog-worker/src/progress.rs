//! Intermediate progress writes.
//!
//! Progress is advisory: each report re-reads the record, skips anything
//! that would move status or progress backward, and drops the write if a
//! concurrent writer got there first.

use tracing::{debug, warn};

use vlog_models::{JobStatus, TrackedJob};
use vlog_store::Repository;

use crate::metrics::record_progress_dropped;

/// Progress reporter for one job.
pub struct ProgressTracker<T> {
    repo: Repository<T>,
    id: String,
}

impl<T: TrackedJob> ProgressTracker<T> {
    pub fn new(repo: Repository<T>, id: impl Into<String>) -> Self {
        Self {
            repo,
            id: id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raise progress within the current status.
    pub async fn report(&self, progress: f64) -> bool {
        self.write(|job| job.progress_state_mut().advance(progress)).await
    }

    /// Move to a later non-terminal status and raise progress.
    pub async fn report_status(&self, status: JobStatus, progress: f64) -> bool {
        self.write(|job| job.progress_state_mut().move_to(status, progress))
            .await
    }

    async fn write<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        let mut job = match self.repo.get(&self.id).await {
            Ok(job) => job,
            Err(e) => {
                warn!(collection = T::COLLECTION, id = %self.id, error = %e, "Progress read failed");
                return false;
            }
        };

        if !apply(&mut job) {
            return false;
        }

        match self.repo.update(&job).await {
            Ok(committed) => {
                debug!(
                    collection = T::COLLECTION,
                    id = %self.id,
                    progress = committed.progress_state().progress,
                    version = committed.version(),
                    "Progress updated"
                );
                true
            }
            Err(e) if e.is_conflict() => {
                record_progress_dropped(T::COLLECTION);
                debug!(collection = T::COLLECTION, id = %self.id, "Progress write lost a race, dropped");
                false
            }
            Err(e) => {
                warn!(collection = T::COLLECTION, id = %self.id, error = %e, "Progress write failed");
                false
            }
        }
    }
}
