//! Video generation polling.
//!
//! Submits a generation, polls the operation until it is done or
//! `max_wait` elapses, then moves the output from the temporary location to
//! `users/{owner}/vlogs/{job_id}.mp4`.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use vlog_ai::{snap_duration, GenerationRequest, OperationStatus, DEFAULT_ASPECT_RATIO};
use vlog_models::{VlogJob, VlogStyle};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_generation_poll;
use crate::output::video_key;
use crate::progress::ProgressTracker;

/// Progress band reserved for generation.
const PROGRESS_START: f64 = 0.5;
const PROGRESS_END: f64 = 0.9;

/// A generated video in durable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVideo {
    pub key: String,
    pub url: String,
    pub duration_secs: u32,
}

/// Build the generation request for a job.
pub fn generation_request(
    prompt: String,
    style: &VlogStyle,
    default_duration: u32,
    job_id: &str,
) -> GenerationRequest {
    let aspect_ratio = style
        .aspect_ratio
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_ASPECT_RATIO)
        .to_string();

    GenerationRequest {
        prompt,
        duration_secs: snap_duration(style.duration, default_duration),
        aspect_ratio,
        job_id: job_id.to_string(),
    }
}

/// Run one generation to completion.
///
/// Stops early only on the shutdown signal or when `max_wait` elapses.
pub async fn generate_video(
    ctx: &PipelineContext,
    owner_id: &str,
    request: GenerationRequest,
    progress: Option<&ProgressTracker<VlogJob>>,
) -> PipelineResult<GeneratedVideo> {
    let poll_interval = ctx.config.poll_interval;
    let max_wait = ctx.config.max_wait;
    let mut shutdown = ctx.shutdown_signal();

    let handle = ctx.generator.submit(&request).await?;
    info!(
        job_id = %request.job_id,
        operation = %handle.name,
        duration_secs = request.duration_secs,
        aspect_ratio = %request.aspect_ratio,
        "Video generation submitted"
    );

    let started = Instant::now();
    let deadline = started + max_wait;
    let mut polls = 0u32;

    let status = loop {
        polls += 1;
        record_generation_poll();
        match ctx.generator.poll(&handle).await {
            Ok(status) if status.done => break status,
            Ok(_) => {
                debug!(job_id = %request.job_id, polls = polls, "Generation still running");
            }
            Err(e) if e.is_retryable() => {
                warn!(job_id = %request.job_id, polls = polls, error = %e, "Generation poll failed, will retry");
            }
            Err(e) => return Err(e.into()),
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(
                job_id = %request.job_id,
                polls = polls,
                max_wait_secs = max_wait.as_secs(),
                "Abandoning video generation"
            );
            return Err(PipelineError::GenerationTimeout(max_wait.as_secs()));
        }

        if let Some(tracker) = progress {
            tracker.report(band_progress(now - started, max_wait)).await;
        }

        let nap = poll_interval.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            _ = cancelled(&mut shutdown) => {
                return Err(PipelineError::Cancelled(format!(
                    "generation for {} interrupted by shutdown",
                    request.job_id
                )));
            }
        }
    };

    let output = completed_output(status)?;
    store_output(ctx, owner_id, &request, &output).await
}

fn completed_output(status: OperationStatus) -> PipelineResult<String> {
    if let Some(error) = status.error.filter(|e| !e.is_empty()) {
        return Err(PipelineError::generation_failed(error));
    }
    status
        .output_location
        .filter(|loc| !loc.is_empty())
        .ok_or_else(|| PipelineError::generation_failed("operation finished without outputs"))
}

async fn store_output(
    ctx: &PipelineContext,
    owner_id: &str,
    request: &GenerationRequest,
    temp_location: &str,
) -> PipelineResult<GeneratedVideo> {
    let data = ctx.storage.download(temp_location).await?;
    let size = data.len();

    let key = video_key(owner_id, &request.job_id);
    let stored_key = ctx.storage.upload(&key, data, "video/mp4").await?;

    if let Err(e) = ctx.storage.delete(temp_location).await {
        warn!(
            job_id = %request.job_id,
            location = %temp_location,
            error = %e,
            "Failed to delete temporary generation output"
        );
    }

    info!(job_id = %request.job_id, key = %stored_key, bytes = size, "Generated video stored");

    Ok(GeneratedVideo {
        url: ctx.storage.public_url(&stored_key),
        key: stored_key,
        duration_secs: request.duration_secs,
    })
}

/// Linear position inside the generation progress band, kept short of the end.
fn band_progress(elapsed: Duration, max_wait: Duration) -> f64 {
    if max_wait.is_zero() {
        return PROGRESS_START;
    }
    let ratio = (elapsed.as_secs_f64() / max_wait.as_secs_f64()).min(1.0);
    let span = PROGRESS_END - PROGRESS_START;
    PROGRESS_START + span * ratio * 0.9
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_snaps_duration_and_defaults_aspect() {
        let style = VlogStyle {
            duration: Some(5),
            ..Default::default()
        };
        let req = generation_request("p".into(), &style, 8, "job-1");
        assert_eq!(req.duration_secs, 6);
        assert_eq!(req.aspect_ratio, "16:9");
        assert_eq!(req.job_id, "job-1");

        let style = VlogStyle {
            duration: Some(30),
            aspect_ratio: Some("9:16".into()),
            ..Default::default()
        };
        let req = generation_request("p".into(), &style, 8, "job-1");
        assert_eq!(req.duration_secs, 8);
        assert_eq!(req.aspect_ratio, "9:16");

        let req = generation_request("p".into(), &VlogStyle::default(), 8, "job-1");
        assert_eq!(req.duration_secs, 8);
    }

    #[test]
    fn test_completed_output() {
        let failed = OperationStatus {
            done: true,
            error: Some("quota exhausted".into()),
            ..Default::default()
        };
        match completed_output(failed) {
            Err(PipelineError::GenerationFailed(msg)) => assert_eq!(msg, "quota exhausted"),
            other => panic!("unexpected {:?}", other),
        }

        let empty = OperationStatus {
            done: true,
            ..Default::default()
        };
        assert!(matches!(completed_output(empty), Err(PipelineError::GenerationFailed(_))));

        let ok = OperationStatus {
            done: true,
            output_location: Some("gs://tmp/temp/job-1/sample_0.mp4".into()),
            error: None,
        };
        assert_eq!(completed_output(ok).unwrap(), "gs://tmp/temp/job-1/sample_0.mp4");
    }

    #[test]
    fn test_band_progress_stays_inside_band() {
        let max = Duration::from_secs(100);
        assert_eq!(band_progress(Duration::ZERO, max), 0.5);
        let late = band_progress(Duration::from_secs(500), max);
        assert!(late < 0.9 && late > 0.85);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_pends_without_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let result = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(result.is_err());
    }
}
