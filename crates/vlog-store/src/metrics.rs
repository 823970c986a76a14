//! Entity store metrics.
//!
//! - Request counters and latency by backend operation
//! - Retry counters
//! - Optimistic-lock conflicts by collection

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Document API requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "vlog_store_requests_total";

    /// Transport-level retries by operation.
    pub const RETRIES_TOTAL: &str = "vlog_store_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vlog_store_latency_seconds";

    /// Conditional writes rejected because the version moved.
    pub const CONFLICTS_TOTAL: &str = "vlog_store_conflicts_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_conflict(collection: &str) {
    counter!(names::CONFLICTS_TOTAL, "collection" => collection.to_string()).increment(1);
}
