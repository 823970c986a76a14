//! Pipeline, dispatch and relay metrics.

use std::time::Duration;

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Finished pipeline runs by pipeline and outcome.
    pub const PIPELINE_RUNS_TOTAL: &str = "vlog_pipeline_runs_total";

    /// Pipeline wall time in seconds.
    pub const PIPELINE_DURATION_SECONDS: &str = "vlog_pipeline_duration_seconds";

    /// Per-item analysis results by outcome.
    pub const ANALYSIS_ITEMS_TOTAL: &str = "vlog_analysis_items_total";

    /// Generation status polls.
    pub const GENERATION_POLLS_TOTAL: &str = "vlog_generation_polls_total";

    /// Intermediate progress writes dropped on conflict.
    pub const PROGRESS_DROPPED_TOTAL: &str = "vlog_progress_dropped_total";

    /// Dispatches by mode and outcome.
    pub const DISPATCH_TOTAL: &str = "vlog_dispatch_total";

    /// Relay deliveries by outcome.
    pub const RELAY_DELIVERIES_TOTAL: &str = "vlog_relay_deliveries_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_pipeline_run(pipeline: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!(
        names::PIPELINE_RUNS_TOTAL,
        "pipeline" => pipeline,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(names::PIPELINE_DURATION_SECONDS, "pipeline" => pipeline)
        .record(elapsed.as_secs_f64());
}

pub fn record_analysis_item(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::ANALYSIS_ITEMS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_generation_poll() {
    counter!(names::GENERATION_POLLS_TOTAL).increment(1);
}

pub fn record_progress_dropped(collection: &'static str) {
    counter!(names::PROGRESS_DROPPED_TOTAL, "collection" => collection).increment(1);
}

pub fn record_dispatch(mode: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!(names::DISPATCH_TOTAL, "mode" => mode, "outcome" => outcome).increment(1);
}

pub fn record_relay_delivery(outcome: &'static str) {
    counter!(names::RELAY_DELIVERIES_TOTAL, "outcome" => outcome).increment(1);
}
