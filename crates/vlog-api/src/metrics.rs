//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use uuid::Uuid;

/// Install the Prometheus recorder.
/// Returns a handle that renders the exposition text.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vlog_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vlog_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vlog_http_requests_in_flight";

    pub const FEEDS_OPENED_TOTAL: &str = "vlog_status_feeds_opened_total";
    pub const UPLOADS_TOTAL: &str = "vlog_uploads_total";
    pub const WEBHOOK_TASKS_TOTAL: &str = "vlog_webhook_tasks_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a status feed being opened.
pub fn record_feed_opened(collection: &'static str) {
    counter!(names::FEEDS_OPENED_TOTAL, "collection" => collection).increment(1);
}

/// Record one uploaded file.
pub fn record_upload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::UPLOADS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a task delivered to a webhook.
pub fn record_webhook_task(task_type: &'static str, outcome: &'static str) {
    counter!(names::WEBHOOK_TASKS_TOTAL, "type" => task_type, "outcome" => outcome).increment(1);
}

/// Replace id segments so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_id = Uuid::parse_str(segment).is_ok()
                || (!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()));
            if is_id {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
