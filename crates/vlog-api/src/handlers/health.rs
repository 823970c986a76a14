//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub dispatch_mode: &'static str,
}

/// Liveness check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        dispatch_mode: state.submitter.dispatch_mode().as_str(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub store: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<CheckStatus>,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>, start: Instant) -> Self {
        match result {
            Ok(()) => Self {
                status: "ok".to_string(),
                error: None,
                latency_ms: Some(start.elapsed().as_millis() as u64),
            },
            Err(e) => Self {
                status: "error".to_string(),
                error: Some(e.to_string()),
                latency_ms: None,
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check: the record store answers a lookup and, in queue mode,
/// Redis answers a ping.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let start = Instant::now();
    let store = CheckStatus::from_result(
        state.stores().vlogs.find("_readiness").await.map(|_| ()),
        start,
    );

    let queue = match &state.queue {
        Some(queue) => {
            let start = Instant::now();
            Some(CheckStatus::from_result(queue.ping().await, start))
        }
        None => None,
    };

    let all_ok = store.is_ok() && queue.as_ref().map_or(true, CheckStatus::is_ok);
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks { store, queue },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
