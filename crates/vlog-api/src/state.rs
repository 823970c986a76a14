//! Application state.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use vlog_ai::{GeminiAnalyzer, MediaAnalyzer, VeoClient, VideoGenerator};
use vlog_queue::{TaskQueue, TaskSink};
use vlog_storage::{MemoryObjectStorage, ObjectStorage, R2Client};
use vlog_store::{DocumentBackend, FirestoreBackend, MemoryBackend};
use vlog_worker::{
    DispatchMode, Dispatcher, InProcessDispatcher, JobSubmitter, PipelineConfig, PipelineContext,
    QueueDispatcher, Stores,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<PipelineContext>,
    pub submitter: JobSubmitter,
    /// Present in queue dispatch mode; checked by the readiness endpoint
    pub queue: Option<Arc<TaskQueue>>,
}

impl AppState {
    /// Assemble state from already-built collaborators.
    pub fn new(config: ApiConfig, pipeline: Arc<PipelineContext>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let submitter = JobSubmitter::new(
            pipeline.stores.clone(),
            Arc::clone(&pipeline.storage),
            dispatcher,
            pipeline.config.max_media_items,
        );

        Self {
            config,
            pipeline,
            submitter,
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: Arc<TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.pipeline.stores
    }

    /// Build every client from the environment.
    ///
    /// `shutdown` is handed to in-process pipelines so generation polling
    /// stops when the server does.
    pub async fn from_env(
        config: ApiConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let pipeline_config = PipelineConfig::from_env();

        let (backend, storage): (Arc<dyn DocumentBackend>, Arc<dyn ObjectStorage>) =
            if config.memory_backends {
                info!("Using in-process record and object storage");
                (Arc::new(MemoryBackend::new()), Arc::new(MemoryObjectStorage::new()))
            } else {
                (
                    Arc::new(FirestoreBackend::from_env().await?),
                    Arc::new(R2Client::from_env().await?),
                )
            };

        let analyzer: Arc<dyn MediaAnalyzer> = Arc::new(GeminiAnalyzer::from_env()?);
        let generator: Arc<dyn VideoGenerator> = Arc::new(VeoClient::from_env().await?);

        let pipeline = Arc::new(
            PipelineContext::new(pipeline_config, backend, storage, analyzer, generator)
                .with_shutdown(shutdown),
        );

        let mode = DispatchMode::from_env();
        info!(mode = mode.as_str(), "Task dispatch mode");

        let state = match mode {
            DispatchMode::InProcess => {
                let dispatcher = Arc::new(InProcessDispatcher::new(Arc::clone(&pipeline)));
                Self::new(config, pipeline, dispatcher)
            }
            DispatchMode::Queue => {
                let queue = Arc::new(TaskQueue::from_env()?);
                queue.init().await?;
                let sink: Arc<dyn TaskSink> = Arc::clone(&queue) as Arc<dyn TaskSink>;
                let dispatcher = Arc::new(QueueDispatcher::new(sink));
                Self::new(config, pipeline, dispatcher).with_queue(queue)
            }
        };

        Ok(state)
    }
}
