//! Vlog generation state machine.
//!
//! `Pending → Processing → {Completed, Failed}`:
//! - the request is validated before any transition or external call
//! - `Pending → Processing` is a conditional write against the version
//!   read at submission
//! - intermediate progress is advisory and dropped on conflict
//! - terminal transitions re-read, apply and retry a bounded number of
//!   times, then surface `ConcurrentUpdateExhausted`
//! - the owner is notified only for a terminal transition this run wrote
//! - a task whose job is already terminal is acknowledged without re-running
//! - a redelivered Processing job is refused while its run holds the lease
//!   and resumed once the lease has lapsed

use std::time::Instant;

use tracing::Instrument;

use vlog_ai::build_vlog_prompt;
use vlog_models::{
    new_record_id, Entity, JobStatus, MediaItem, Notification, TrackedJob, VlogJob, VlogOutput,
    VlogRequest, VlogTask,
};

use crate::analysis::analyze_items;
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::generation::{generate_video, generation_request};
use crate::logging::JobLogger;
use crate::metrics::record_pipeline_run;
use crate::output::{
    build_analytics, build_subtitles, derive_description, derive_title, new_share_code, share_url,
};
use crate::progress::ProgressTracker;

pub const OPERATION: &str = "generate_vlog";

const PROGRESS_STARTED: f64 = 0.1;
const PROGRESS_ANALYZED: f64 = 0.5;
const PROGRESS_FINALIZING: f64 = 0.9;

/// How a task run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    /// The job was moved to Failed with this message
    Failed(String),
    /// Nothing to do; the job was already terminal
    AlreadyTerminal,
}

/// Reject requests the pipeline cannot run.
pub fn validate_request(
    owner_id: &str,
    request: &VlogRequest,
    max_media_items: usize,
) -> PipelineResult<()> {
    if owner_id.trim().is_empty() {
        return Err(PipelineError::invalid_input("owner id is required"));
    }
    if request.media_items.is_empty() {
        return Err(PipelineError::invalid_input("at least one media item is required"));
    }
    if request.media_items.len() > max_media_items {
        return Err(PipelineError::invalid_input(format!(
            "too many media items: {} (max {})",
            request.media_items.len(),
            max_media_items
        )));
    }
    Ok(())
}

/// Run the vlog pipeline for a dispatched task.
pub async fn run_vlog_job(
    ctx: &PipelineContext,
    job_id: &str,
    expected_version: u64,
    task: &VlogTask,
) -> PipelineResult<RunOutcome> {
    let logger = JobLogger::new(job_id, &task.owner_id, OPERATION);
    let span = logger.create_span();
    let started = Instant::now();

    let result = run(ctx, &logger, job_id, expected_version, task)
        .instrument(span)
        .await;

    let outcome = match &result {
        Ok(RunOutcome::Completed) => "completed",
        Ok(RunOutcome::Failed(_)) => "failed",
        Ok(RunOutcome::AlreadyTerminal) => "skipped",
        Err(_) => "error",
    };
    record_pipeline_run(OPERATION, outcome, started.elapsed());
    result
}

async fn run(
    ctx: &PipelineContext,
    logger: &JobLogger,
    job_id: &str,
    expected_version: u64,
    task: &VlogTask,
) -> PipelineResult<RunOutcome> {
    validate_request(&task.owner_id, &task.request, ctx.config.max_media_items)?;

    let vlogs = &ctx.stores.vlogs;
    let mut job = vlogs.get(job_id).await?;

    if job.is_terminal() {
        logger.log_progress(&format!(
            "already {}, acknowledging redelivery",
            job.state.status
        ));
        return Ok(RunOutcome::AlreadyTerminal);
    }
    if job.owner_id() != task.owner_id {
        return Err(PipelineError::invalid_input(format!(
            "task owner {} does not own job {}",
            task.owner_id, job_id
        )));
    }

    match job.state.status {
        JobStatus::Pending if job.version() != expected_version => {
            return Err(vlog_store::StoreError::conflict(
                VlogJob::COLLECTION,
                job_id,
                expected_version,
            )
            .into());
        }
        JobStatus::Processing if job.state.started_within(ctx.config.processing_lease) => {
            return Err(PipelineError::AlreadyRunning(job_id.to_string()));
        }
        JobStatus::Processing => {
            logger.log_warning("processing lease lapsed, resuming after redelivery");
            // The resumed run takes a fresh lease.
            job.state.started_at = None;
        }
        _ => {}
    }

    if !job.state.begin(JobStatus::Processing, PROGRESS_STARTED) {
        return Ok(RunOutcome::AlreadyTerminal);
    }
    let job = vlogs.update(&job).await?;
    logger.log_start(&format!("{} media items", task.request.media_items.len()));

    let tracker = ProgressTracker::new(vlogs.clone(), job_id);
    match produce_output(ctx, logger, &job, &tracker).await {
        Ok(output) => {
            let title = output.title.clone();
            if !finalize_completed(ctx, job_id, output).await? {
                logger.log_warning("job reached a terminal state elsewhere before completion");
                return Ok(RunOutcome::AlreadyTerminal);
            }
            ctx.notifier
                .send(Notification::vlog_completed(job.owner_id(), job_id, &title))
                .await;
            logger.log_completion(&title);
            Ok(RunOutcome::Completed)
        }
        Err(e) => {
            let message = e.to_string();
            logger.log_error(&message);
            if !finalize_failed(ctx, job_id, &message).await? {
                logger.log_warning("job reached a terminal state elsewhere before failure");
                return Ok(RunOutcome::AlreadyTerminal);
            }
            ctx.notifier
                .send(Notification::vlog_failed(job.owner_id(), job_id, &message))
                .await;
            Ok(RunOutcome::Failed(message))
        }
    }
}

async fn produce_output(
    ctx: &PipelineContext,
    logger: &JobLogger,
    job: &VlogJob,
    tracker: &ProgressTracker<VlogJob>,
) -> PipelineResult<VlogOutput> {
    let owner_id = job.owner_id();
    let request = &job.request;

    let mut items: Vec<MediaItem> = request.media_items.clone();
    items.sort_by_key(|item| item.order);

    let outcome = analyze_items(ctx, owner_id, &items).await?;
    logger.log_progress(&format!(
        "analysis done: {} ok, {} failed",
        outcome.summary.successful_items, outcome.summary.failed_items
    ));
    tracker.report(PROGRESS_ANALYZED).await;

    let prompt = build_vlog_prompt(&outcome.analyses, &request.style);
    let generation = generation_request(
        prompt,
        &request.style,
        ctx.config.default_duration_secs,
        job.id(),
    );
    let video = generate_video(ctx, owner_id, generation, Some(tracker)).await?;
    tracker.report(PROGRESS_FINALIZING).await;

    let thumbnail_url = match ctx.thumbnails.render(owner_id, job.id(), &video.url).await {
        Ok(url) => url,
        Err(e) => {
            logger.log_warning(&format!("thumbnail failed: {}", e));
            String::new()
        }
    };

    let duration = f64::from(video.duration_secs);
    Ok(VlogOutput {
        video_id: new_record_id(),
        video_url: video.url,
        share_url: share_url(&ctx.config.share_base_url, &new_share_code()),
        thumbnail_url,
        duration,
        title: derive_title(request, &outcome.summary),
        description: derive_description(&outcome.summary),
        subtitles: build_subtitles(&outcome.analyses, duration),
        analytics: build_analytics(&outcome.summary, &outcome.analyses),
    })
}

/// Move a job to Completed with `output`.
///
/// Returns false when the job was already terminal and nothing was written.
async fn finalize_completed(ctx: &PipelineContext, job_id: &str, output: VlogOutput) -> PipelineResult<bool> {
    let committed = ctx
        .stores
        .vlogs
        .modify(job_id, ctx.config.finalize_attempts, |job| {
            if job.is_terminal() {
                return false;
            }
            job.apply_output(output.clone());
            job.state.complete()
        })
        .await?;
    Ok(committed.is_some())
}

/// Move a job to Failed with `message` and progress reset to 0.
///
/// Returns false when the job was already terminal and nothing was written.
pub async fn finalize_failed(ctx: &PipelineContext, job_id: &str, message: &str) -> PipelineResult<bool> {
    let committed = ctx
        .stores
        .vlogs
        .modify(job_id, ctx.config.finalize_attempts, |job| job.state.fail(message, 0.0))
        .await?;
    Ok(committed.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlog_models::MediaKind;

    fn item(i: u32) -> MediaItem {
        MediaItem {
            file_id: format!("m{}", i),
            url: format!("users/u1/media/m{}.jpg", i),
            kind: MediaKind::Image,
            content_type: None,
            timestamp: None,
            order: i,
        }
    }

    #[test]
    fn test_validation() {
        let mut request = VlogRequest::default();
        assert!(matches!(
            validate_request("u1", &request, 50),
            Err(PipelineError::InvalidInput(_))
        ));

        request.media_items = (0..3).map(item).collect();
        assert!(validate_request("u1", &request, 50).is_ok());
        assert!(validate_request(" ", &request, 50).is_err());
        assert!(validate_request("u1", &request, 2).is_err());
    }
}
