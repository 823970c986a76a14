//! Task dispatch and job submission.
//!
//! - [`Dispatcher`] is fire-and-forget: execution never depends on the
//!   caller staying alive
//! - [`InProcessDispatcher`] spawns the pipeline on its own tokio task
//! - [`QueueDispatcher`] enqueues the task payload for the relay
//! - [`JobSubmitter`] creates records, dispatches, and compensates a failed
//!   dispatch by moving the record to Failed

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn, Instrument};

use vlog_models::{
    new_record_id, Entity, JobStatus, MediaAnalysisTask, MediaJob, TaskKind, TaskPayload,
    VlogJob, VlogRequest, VlogTask,
};
use vlog_queue::TaskSink;
use vlog_storage::ObjectStorage;

use crate::config::DispatchMode;
use crate::context::{PipelineContext, Stores};
use crate::error::{PipelineError, PipelineResult};
use crate::media_pipeline::{run_media_analysis, MediaBatchOutcome};
use crate::metrics::record_dispatch;
use crate::vlog_pipeline::{run_vlog_job, validate_request, RunOutcome};

/// Attempts for compensating writes.
const COMPENSATION_ATTEMPTS: u32 = 2;

/// Progress of a media record whose bytes are stored and await analysis.
const PROGRESS_UPLOADED: f64 = 0.5;

/// Result of executing one task payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Vlog(RunOutcome),
    Media(MediaBatchOutcome),
}

/// Run the pipeline a payload names.
pub async fn execute_task(ctx: &PipelineContext, payload: &TaskPayload) -> PipelineResult<TaskOutcome> {
    match &payload.kind {
        TaskKind::GenerateVlog(task) => run_vlog_job(ctx, &payload.id, payload.version, task)
            .await
            .map(TaskOutcome::Vlog),
        TaskKind::AnalyzeMedia(task) => run_media_analysis(ctx, &payload.id, task)
            .await
            .map(TaskOutcome::Media),
    }
}

// =============================================================================
// Dispatchers
// =============================================================================

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Hand off a task. Returns once the task is accepted, not when it runs.
    async fn dispatch(&self, payload: TaskPayload) -> PipelineResult<()>;

    fn mode(&self) -> DispatchMode;
}

/// Runs tasks on detached tokio tasks in this process.
pub struct InProcessDispatcher {
    ctx: Arc<PipelineContext>,
}

impl InProcessDispatcher {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Dispatcher for InProcessDispatcher {
    async fn dispatch(&self, payload: TaskPayload) -> PipelineResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let span = tracing::info_span!("task", task_id = %payload.id, task_type = payload.kind.type_name());

        tokio::spawn(
            async move {
                match execute_task(&ctx, &payload).await {
                    Ok(outcome) => debug!(outcome = ?outcome, "In-process task finished"),
                    Err(e) => error!(error = %e, "In-process task failed"),
                }
            }
            .instrument(span),
        );

        record_dispatch(DispatchMode::InProcess.as_str(), true);
        Ok(())
    }

    fn mode(&self) -> DispatchMode {
        DispatchMode::InProcess
    }
}

/// Enqueues tasks for the relay.
pub struct QueueDispatcher {
    sink: Arc<dyn TaskSink>,
}

impl QueueDispatcher {
    pub fn new(sink: Arc<dyn TaskSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Dispatcher for QueueDispatcher {
    async fn dispatch(&self, payload: TaskPayload) -> PipelineResult<()> {
        let mode = DispatchMode::Queue.as_str();
        match self.sink.enqueue(&payload).await {
            Ok(message_id) => {
                record_dispatch(mode, true);
                debug!(task_id = %payload.id, message_id = %message_id, "Task enqueued");
                Ok(())
            }
            Err(e) if e.is_duplicate() => {
                record_dispatch(mode, true);
                debug!(task_id = %payload.id, "Task already enqueued");
                Ok(())
            }
            Err(e) => {
                record_dispatch(mode, false);
                Err(PipelineError::dispatch_failure(e.to_string()))
            }
        }
    }

    fn mode(&self) -> DispatchMode {
        DispatchMode::Queue
    }
}

// =============================================================================
// Submission
// =============================================================================

/// Creates jobs and hands them to a dispatcher.
#[derive(Clone)]
pub struct JobSubmitter {
    stores: Stores,
    storage: Arc<dyn ObjectStorage>,
    dispatcher: Arc<dyn Dispatcher>,
    max_media_items: usize,
}

impl JobSubmitter {
    pub fn new(
        stores: Stores,
        storage: Arc<dyn ObjectStorage>,
        dispatcher: Arc<dyn Dispatcher>,
        max_media_items: usize,
    ) -> Self {
        Self {
            stores,
            storage,
            dispatcher,
            max_media_items,
        }
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.dispatcher.mode()
    }

    /// Create a Pending vlog job and dispatch it.
    ///
    /// If dispatch fails the job is moved to Failed before the error is
    /// returned.
    pub async fn submit_vlog(&self, owner_id: &str, request: VlogRequest) -> PipelineResult<VlogJob> {
        validate_request(owner_id, &request, self.max_media_items)?;

        let job = self
            .stores
            .vlogs
            .create(owner_id, VlogJob::new(owner_id, request.clone()))
            .await?;

        let payload = TaskPayload::generate_vlog(
            job.id(),
            job.version(),
            VlogTask {
                owner_id: owner_id.to_string(),
                request,
            },
        );

        if let Err(e) = self.dispatcher.dispatch(payload).await {
            self.compensate_vlog(job.id(), &e).await;
            return Err(e);
        }

        info!(
            job_id = %job.id(),
            owner_id = %owner_id,
            mode = self.dispatcher.mode().as_str(),
            "Vlog job submitted"
        );
        Ok(job)
    }

    /// Dispatch analysis for media records that are Pending.
    pub async fn submit_media_analysis(&self, owner_id: &str, media_ids: Vec<String>) -> PipelineResult<()> {
        if owner_id.trim().is_empty() {
            return Err(PipelineError::invalid_input("owner id is required"));
        }
        if media_ids.is_empty() {
            return Err(PipelineError::invalid_input("no media to analyze"));
        }

        let payload = TaskPayload::analyze_media(
            new_record_id(),
            1,
            MediaAnalysisTask {
                owner_id: owner_id.to_string(),
                media_ids: media_ids.clone(),
            },
        );

        if let Err(e) = self.dispatcher.dispatch(payload).await {
            for media_id in &media_ids {
                self.compensate_media(media_id, &e).await;
            }
            return Err(e);
        }

        info!(owner_id = %owner_id, count = media_ids.len(), "Media analysis submitted");
        Ok(())
    }

    /// Record an upload: Uploading record, bytes to storage, then Pending
    /// with the stored key.
    pub async fn accept_upload(
        &self,
        owner_id: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> PipelineResult<MediaJob> {
        let media = self
            .stores
            .media
            .create(
                owner_id,
                MediaJob::uploading(owner_id, file_name, content_type, data.len() as u64),
            )
            .await?;

        let key = media_key(owner_id, media.id(), file_name);
        let stored = match self.storage.upload(&key, data, content_type).await {
            Ok(stored) => stored,
            Err(e) => {
                let err = PipelineError::from(e);
                self.compensate_media(media.id(), &err).await;
                return Err(err);
            }
        };

        let committed = self
            .stores
            .media
            .modify(media.id(), COMPENSATION_ATTEMPTS, |m| {
                m.url = Some(stored.clone());
                m.state.move_to(JobStatus::Pending, PROGRESS_UPLOADED)
            })
            .await?;

        committed.ok_or_else(|| PipelineError::not_found(format!("media {} left Uploading", media.id())))
    }

    async fn compensate_vlog(&self, job_id: &str, cause: &PipelineError) {
        let message = cause.to_string();
        match self
            .stores
            .vlogs
            .modify(job_id, COMPENSATION_ATTEMPTS, |job| job.state.fail(message.as_str(), 0.0))
            .await
        {
            Ok(_) => warn!(job_id = %job_id, error = %message, "Dispatch failed, job marked failed"),
            Err(e) => error!(job_id = %job_id, error = %e, "Failed to compensate undispatched job"),
        }
    }

    async fn compensate_media(&self, media_id: &str, cause: &PipelineError) {
        let message = cause.to_string();
        match self
            .stores
            .media
            .modify(media_id, COMPENSATION_ATTEMPTS, |m| m.state.fail(message.as_str(), 0.0))
            .await
        {
            Ok(_) => warn!(media_id = %media_id, error = %message, "Media marked failed"),
            Err(e) => error!(media_id = %media_id, error = %e, "Failed to compensate media"),
        }
    }
}

/// Storage key for an uploaded file, keeping its extension.
pub fn media_key(owner_id: &str, media_id: &str, file_name: &str) -> String {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("users/{}/media/{}.{}", owner_id, media_id, ext),
        None => format!("users/{}/media/{}", owner_id, media_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_key() {
        assert_eq!(media_key("u1", "m1", "Beach.JPG"), "users/u1/media/m1.jpg");
        assert_eq!(media_key("u1", "m1", "noext"), "users/u1/media/m1");
        assert_eq!(media_key("u1", "m1", "weird.../x"), "users/u1/media/m1");
    }
}
