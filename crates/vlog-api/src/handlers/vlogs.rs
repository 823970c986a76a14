//! Vlog submission and status handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use validator::Validate;

use vlog_models::{MediaItem, VlogJob, VlogRequest, VlogStyle};
use vlog_worker::watch_job;

use crate::error::{ApiError, ApiResult};
use crate::extract::ActingUser;
use crate::feed::sse_feed;
use crate::metrics::record_feed_opened;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Body of `POST /api/vlogs`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateVlogBody {
    #[validate(length(min = 1, message = "at least one media item is required"))]
    pub media_items: Vec<MediaItem>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub destination: Option<String>,
    #[serde(default)]
    pub travel_date: Option<String>,
    #[serde(default)]
    pub style: VlogStyle,
}

impl From<CreateVlogBody> for VlogRequest {
    fn from(body: CreateVlogBody) -> Self {
        VlogRequest {
            media_items: body.media_items,
            title: body.title,
            destination: body.destination,
            travel_date: body.travel_date,
            style: body.style,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVlogResponse {
    pub job_id: String,
    pub status: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/vlogs
///
/// Accepts the job and returns before any pipeline work starts.
pub async fn create_vlog(
    State(state): State<AppState>,
    user: ActingUser,
    Json(body): Json<CreateVlogBody>,
) -> ApiResult<(StatusCode, Json<CreateVlogResponse>)> {
    body.validate()?;

    let job = state.submitter.submit_vlog(&user.uid, body.into()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateVlogResponse {
            job_id: job.meta.id,
            status: "processing".to_string(),
        }),
    ))
}

/// GET /api/vlogs/:id
pub async fn get_vlog(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: ActingUser,
) -> ApiResult<Json<VlogJob>> {
    Ok(Json(owned_vlog(&state, &user, &job_id).await?))
}

/// GET /api/vlogs/:id/events
pub async fn vlog_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: ActingUser,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static>> {
    owned_vlog(&state, &user, &job_id).await?;
    record_feed_opened("vlogs");

    let feed = watch_job(state.stores().vlogs.clone(), job_id, state.config.feed_interval);
    Ok(sse_feed(feed))
}

async fn owned_vlog(state: &AppState, user: &ActingUser, job_id: &str) -> ApiResult<VlogJob> {
    let job = state
        .stores()
        .vlogs
        .find(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("vlog {}", job_id)))?;
    user.ensure_owns(&job)?;
    Ok(job)
}
