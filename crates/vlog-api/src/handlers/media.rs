//! Media upload and analysis status handlers.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vlog_models::{Entity, JobStatus, MediaJob, MediaKind};
use vlog_worker::watch_jobs;

use crate::error::{ApiError, ApiResult};
use crate::extract::ActingUser;
use crate::feed::sse_feed;
use crate::metrics::{record_feed_opened, record_upload};
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub kind: MediaKind,
    pub size: u64,
    pub status: JobStatus,
}

impl From<&MediaJob> for UploadedMedia {
    fn from(media: &MediaJob) -> Self {
        Self {
            id: media.id().to_string(),
            file_name: media.file_name.clone(),
            content_type: media.content_type.clone(),
            kind: media.kind,
            size: media.size,
            status: media.state.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RejectedUpload {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub media: Vec<UploadedMedia>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedUpload>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaFeedQuery {
    /// Comma-separated media ids
    pub ids: String,
}

struct IncomingFile {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/media
///
/// Every file part becomes a media record; stored files are then analyzed
/// as one batch.
pub async fn upload_media(
    State(state): State<AppState>,
    user: ActingUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let files = read_files(multipart).await?;
    let limit = state.pipeline.config.max_media_items;

    if files.is_empty() {
        return Err(ApiError::bad_request("upload contains no files"));
    }
    if files.len() > limit {
        return Err(ApiError::Validation(format!(
            "{} files exceed the limit of {}",
            files.len(),
            limit
        )));
    }

    let mut media = Vec::with_capacity(files.len());
    let mut rejected = Vec::new();

    for file in files {
        if file.data.is_empty() {
            rejected.push(RejectedUpload {
                file_name: file.file_name,
                error: "file is empty".to_string(),
            });
            continue;
        }

        match state
            .submitter
            .accept_upload(&user.uid, &file.file_name, &file.content_type, file.data)
            .await
        {
            Ok(stored) => {
                record_upload(true);
                media.push(UploadedMedia::from(&stored));
            }
            Err(e) => {
                record_upload(false);
                warn!(owner_id = %user.uid, file_name = %file.file_name, error = %e, "Upload failed");
                rejected.push(RejectedUpload {
                    file_name: file.file_name,
                    error: e.to_string(),
                });
            }
        }
    }

    if media.is_empty() {
        let first = rejected.first().map(|r| r.error.clone()).unwrap_or_default();
        return Err(ApiError::bad_request(format!("no file was stored: {}", first)));
    }

    let ids: Vec<String> = media.iter().map(|m| m.id.clone()).collect();
    state.submitter.submit_media_analysis(&user.uid, ids).await?;

    info!(owner_id = %user.uid, stored = media.len(), rejected = rejected.len(), "Media accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            media,
            rejected,
            status: "processing".to_string(),
        }),
    ))
}

/// GET /api/media/events?ids=a,b
pub async fn media_events(
    State(state): State<AppState>,
    Query(query): Query<MediaFeedQuery>,
    user: ActingUser,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static>> {
    let ids = parse_ids(&query.ids, state.pipeline.config.max_media_items)?;

    // Unknown ids would keep the feed open forever.
    for id in &ids {
        let media = state
            .stores()
            .media
            .find(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("media {}", id)))?;
        user.ensure_owns(&media)?;
    }

    record_feed_opened("medias");
    let feed = watch_jobs(state.stores().media.clone(), ids, state.config.feed_interval);
    Ok(sse_feed(feed))
}

// ============================================================================
// Helpers
// ============================================================================

async fn read_files(mut multipart: Multipart) -> ApiResult<Vec<IncomingFile>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        files.push(IncomingFile {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }

    Ok(files)
}

/// Split, trim and de-duplicate a comma-separated id list.
pub fn parse_ids(raw: &str, limit: usize) -> ApiResult<Vec<String>> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }

    if ids.is_empty() {
        return Err(ApiError::bad_request("ids must name at least one media"));
    }
    if ids.len() > limit {
        return Err(ApiError::Validation(format!(
            "{} ids exceed the limit of {}",
            ids.len(),
            limit
        )));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids(" a, b,,a ", 5).unwrap(), vec!["a", "b"]);
        assert!(matches!(parse_ids(" , ", 5), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_ids("a,b,c", 2), Err(ApiError::Validation(_))));
    }
}
