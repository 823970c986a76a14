//! Task webhooks invoked by the queue relay.
//!
//! - The pipeline runs on its own tokio task, so a dropped relay connection
//!   does not abort it
//! - Terminal jobs are acknowledged with 200 so redeliveries stop
//! - Client errors answer 4xx, which the relay dead-letters right away

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use vlog_models::{TaskKind, TaskPayload};
use vlog_worker::{execute_task, PipelineError, RunOutcome, TaskOutcome};

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_webhook_task;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
}

impl TaskResponse {
    fn new(task_id: String, outcome: TaskOutcome) -> Self {
        let mut response = Self {
            task_id,
            status: String::new(),
            error: None,
            completed: None,
            failed: None,
            skipped: None,
        };

        match outcome {
            TaskOutcome::Vlog(RunOutcome::Completed) => response.status = "completed".into(),
            TaskOutcome::Vlog(RunOutcome::Failed(message)) => {
                response.status = "failed".into();
                response.error = Some(message);
            }
            TaskOutcome::Vlog(RunOutcome::AlreadyTerminal) => {
                response.status = "already_terminal".into()
            }
            TaskOutcome::Media(batch) => {
                response.status = "processed".into();
                response.completed = Some(batch.completed);
                response.failed = Some(batch.failed);
                response.skipped = Some(batch.skipped);
            }
        }
        response
    }
}

/// POST /internal/tasks/create-vlog
pub async fn create_vlog_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskPayload>,
) -> ApiResult<Json<TaskResponse>> {
    if !matches!(payload.kind, TaskKind::GenerateVlog(_)) {
        return Err(ApiError::bad_request(format!(
            "expected a vlog task, got {}",
            payload.kind.type_name()
        )));
    }
    run_task(state, payload).await
}

/// POST /internal/tasks/analyze-media
pub async fn analyze_media_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskPayload>,
) -> ApiResult<Json<TaskResponse>> {
    if !matches!(payload.kind, TaskKind::AnalyzeMedia(_)) {
        return Err(ApiError::bad_request(format!(
            "expected a media analysis task, got {}",
            payload.kind.type_name()
        )));
    }
    run_task(state, payload).await
}

async fn run_task(state: AppState, payload: TaskPayload) -> ApiResult<Json<TaskResponse>> {
    let task_type = payload.kind.type_name();
    let task_id = payload.id.clone();
    let pipeline = Arc::clone(&state.pipeline);
    let span = tracing::info_span!("webhook_task", task_id = %task_id, task_type);

    let handle = tokio::spawn(async move { execute_task(&pipeline, &payload).await }.instrument(span));
    let result = handle
        .await
        .map_err(|e| ApiError::internal(format!("task {} aborted: {}", task_id, e)))?;

    match result {
        Ok(outcome) => {
            record_webhook_task(task_type, "ok");
            info!(task_id = %task_id, task_type, outcome = ?outcome, "Webhook task finished");
            Ok(Json(TaskResponse::new(task_id, outcome)))
        }
        Err(e) => {
            let outcome = match &e {
                PipelineError::OptimisticLockConflict(_) => "rejected",
                e if e.is_client_error() => "rejected",
                _ => "error",
            };
            record_webhook_task(task_type, outcome);
            warn!(task_id = %task_id, task_type, error = %e, "Webhook task failed");
            Err(e.into())
        }
    }
}
