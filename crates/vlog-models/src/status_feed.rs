//! Status feed snapshots pushed to subscribers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::TrackedJob;
use crate::job_status::JobStatus;

/// Point-in-time view of a tracked set of jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusSnapshot<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub all_completed: bool,
}

impl<T: TrackedJob> StatusSnapshot<T> {
    /// Build a snapshot over the records that could be loaded.
    ///
    /// `total_count` is the number of tracked ids, so records skipped due to
    /// lookup failures keep `all_completed` false.
    pub fn from_items(items: Vec<T>, total_count: usize) -> Self {
        let completed_count = items
            .iter()
            .filter(|i| i.progress_state().status == JobStatus::Completed)
            .count();
        let failed_count = items
            .iter()
            .filter(|i| i.progress_state().status == JobStatus::Failed)
            .count();

        Self {
            all_completed: completed_count + failed_count == total_count,
            items,
            total_count,
            completed_count,
            failed_count,
        }
    }
}

/// One event on the status feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<T> {
    /// Current state of the tracked jobs
    Snapshot(StatusSnapshot<T>),
    /// Every tracked job reached a terminal state; the feed ends
    Complete,
}
