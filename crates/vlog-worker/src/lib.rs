//! Vlog generation pipelines.
//!
//! This crate provides:
//! - Media analysis orchestration and video generation polling
//! - The vlog and media job state machines
//! - In-process and queue task dispatch with compensating writes
//! - Polling status feeds
//! - The relay that delivers queued tasks to the API webhooks

pub mod analysis;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod generation;
pub mod logging;
pub mod media_pipeline;
pub mod metrics;
pub mod notifier;
pub mod output;
pub mod progress;
pub mod relay;
pub mod status_feed;
pub mod vlog_pipeline;

pub use analysis::{analyze_items, AnalysisOutcome};
pub use config::{DispatchMode, PipelineConfig, RelayConfig};
pub use context::{PipelineContext, Stores};
pub use dispatcher::{
    execute_task, Dispatcher, InProcessDispatcher, JobSubmitter, QueueDispatcher, TaskOutcome,
};
pub use error::{PipelineError, PipelineResult};
pub use generation::{generate_video, GeneratedVideo};
pub use logging::JobLogger;
pub use media_pipeline::{run_media_analysis, MediaBatchOutcome};
pub use notifier::Notifier;
pub use output::{PublicUrlThumbnails, ThumbnailRenderer};
pub use progress::ProgressTracker;
pub use relay::{DeliveryError, RelayExecutor, WebhookClient};
pub use status_feed::{watch_job, watch_jobs};
pub use vlog_pipeline::{run_vlog_job, validate_request, RunOutcome};
