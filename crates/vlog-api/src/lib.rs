//! Axum HTTP API server.
//!
//! This crate provides:
//! - Vlog submission with 202 semantics and per-job SSE status feeds
//! - Multipart media upload feeding the media analysis pipeline
//! - Task webhooks the queue relay delivers to
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use extract::{ActingUser, USER_ID_HEADER};
pub use routes::create_router;
pub use state::AppState;
