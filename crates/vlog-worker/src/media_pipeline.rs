//! Media analysis jobs.
//!
//! Each media record moves `Pending (0.5) → Analyzing (0.6) → Completed (1.0)` or
//! `→ Failed (0.5)` independently; the owner gets one notification per
//! media. Records that are missing, already terminal or owned by someone
//! else are skipped.

use std::time::Instant;

use tracing::{warn, Instrument};

use vlog_models::{Entity, JobStatus, MediaAnalysisTask, MediaJob, Notification, TrackedJob};

use crate::analysis::{analyze_one, persist_analytics};
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics::record_pipeline_run;

pub const OPERATION: &str = "analyze_media";

const PROGRESS_ANALYZING: f64 = 0.6;
const PROGRESS_FAILED: f64 = 0.5;

/// Per-batch counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaBatchOutcome {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Analyze every media record named by `task`.
///
/// Fails when a record could not be read or written, with the first such
/// error; the other media still run. Media already finished are skipped
/// when the task is redelivered.
pub async fn run_media_analysis(
    ctx: &PipelineContext,
    task_id: &str,
    task: &MediaAnalysisTask,
) -> PipelineResult<MediaBatchOutcome> {
    let logger = JobLogger::new(task_id, &task.owner_id, OPERATION);
    let started = Instant::now();

    let result = run(ctx, &logger, task).instrument(logger.create_span()).await;

    let outcome = if result.is_ok() { "completed" } else { "error" };
    record_pipeline_run(OPERATION, outcome, started.elapsed());
    result
}

async fn run(
    ctx: &PipelineContext,
    logger: &JobLogger,
    task: &MediaAnalysisTask,
) -> PipelineResult<MediaBatchOutcome> {
    if task.owner_id.trim().is_empty() {
        return Err(PipelineError::invalid_input("owner id is required"));
    }
    logger.log_start(&format!("{} media", task.media_ids.len()));

    let mut outcome = MediaBatchOutcome::default();
    let mut errors: Vec<PipelineError> = Vec::new();

    for (order, media_id) in task.media_ids.iter().enumerate() {
        match analyze_media(ctx, &task.owner_id, media_id, order as u32).await {
            Ok(Some(true)) => outcome.completed += 1,
            Ok(Some(false)) => outcome.failed += 1,
            Ok(None) => outcome.skipped += 1,
            Err(e) => {
                logger.log_error(&format!("media {}: {}", media_id, e));
                errors.push(e);
            }
        }
    }

    // The rest of the batch still ran; the first error decides the answer.
    if let Some(first) = errors.into_iter().next() {
        return Err(first);
    }

    logger.log_completion(&format!(
        "{} completed, {} failed, {} skipped",
        outcome.completed, outcome.failed, outcome.skipped
    ));
    Ok(outcome)
}

/// `Some(true)` completed, `Some(false)` failed, `None` skipped.
async fn analyze_media(
    ctx: &PipelineContext,
    owner_id: &str,
    media_id: &str,
    order: u32,
) -> PipelineResult<Option<bool>> {
    let repo = &ctx.stores.media;
    let attempts = ctx.config.finalize_attempts;

    let media = match repo.find(media_id).await? {
        Some(media) => media,
        None => {
            warn!(media_id = %media_id, "Media record not found, skipping");
            return Ok(None);
        }
    };
    if media.is_terminal() {
        return Ok(None);
    }
    if media.owner_id() != owner_id {
        warn!(media_id = %media_id, owner_id = %owner_id, "Media owned by another user, skipping");
        return Ok(None);
    }

    let Some(media) = repo
        .modify(media_id, attempts, |m| {
            m.state.begin(JobStatus::Analyzing, PROGRESS_ANALYZING)
        })
        .await?
    else {
        return Ok(None);
    };

    let result = match media.to_item(order) {
        Some(item) => analyze_one(ctx, &item).await,
        None => Err(PipelineError::invalid_input("media has no uploaded file")),
    };

    match result {
        Ok(analysis) => {
            persist_analytics(ctx, owner_id, &analysis).await;
            if finish(ctx, media_id, |m| m.state.complete()).await? {
                ctx.notifier
                    .send(Notification::media_completed(owner_id, media_id, &media.file_name))
                    .await;
            }
            Ok(Some(true))
        }
        Err(e) => {
            let message = e.to_string();
            warn!(media_id = %media_id, error = %message, "Media analysis failed");
            if finish(ctx, media_id, |m| m.state.fail(message.as_str(), PROGRESS_FAILED)).await? {
                ctx.notifier
                    .send(Notification::media_failed(owner_id, media_id, &message))
                    .await;
            }
            Ok(Some(false))
        }
    }
}

/// Terminal write; false when another writer already finished the record.
async fn finish<F>(ctx: &PipelineContext, media_id: &str, apply: F) -> PipelineResult<bool>
where
    F: FnMut(&mut MediaJob) -> bool + Send,
{
    let committed = ctx
        .stores
        .media
        .modify(media_id, ctx.config.finalize_attempts, apply)
        .await?;
    Ok(committed.is_some())
}
