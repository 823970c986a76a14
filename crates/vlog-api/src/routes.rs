//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    analyze_media_task, create_vlog, create_vlog_task, get_vlog, health, media_events, ready,
    upload_media, vlog_events,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/vlogs", post(create_vlog))
        .route("/vlogs/:id", get(get_vlog))
        .route("/vlogs/:id/events", get(vlog_events))
        .route("/media", post(upload_media))
        .route("/media/events", get(media_events));

    // Called by the queue relay; not exposed through the gateway.
    let task_routes = Router::new()
        .route("/tasks/create-vlog", post(create_vlog_task))
        .route("/tasks/analyze-media", post(analyze_media_task));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .nest("/api", api_routes)
        .nest("/internal", task_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Multipart's own 2MB default would undercut the configured limit.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
