//! Shared dependencies for pipeline runs.
//!
//! Clients are built once at start-up and injected as trait objects; a
//! pipeline task holds only an `Arc<PipelineContext>`.

use std::sync::Arc;

use tokio::sync::watch;

use vlog_ai::{MediaAnalyzer, VideoGenerator};
use vlog_models::{MediaAnalytics, MediaJob, Notification, VlogJob};
use vlog_storage::ObjectStorage;
use vlog_store::{DocumentBackend, Repository};

use crate::config::PipelineConfig;
use crate::notifier::Notifier;
use crate::output::{PublicUrlThumbnails, ThumbnailRenderer};

/// Typed repositories over one document backend.
#[derive(Clone)]
pub struct Stores {
    pub vlogs: Repository<VlogJob>,
    pub media: Repository<MediaJob>,
    pub analytics: Repository<MediaAnalytics>,
    pub notifications: Repository<Notification>,
}

impl Stores {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            vlogs: Repository::new(Arc::clone(&backend)),
            media: Repository::new(Arc::clone(&backend)),
            analytics: Repository::new(Arc::clone(&backend)),
            notifications: Repository::new(backend),
        }
    }
}

/// Everything a pipeline run needs.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub stores: Stores,
    pub storage: Arc<dyn ObjectStorage>,
    pub analyzer: Arc<dyn MediaAnalyzer>,
    pub generator: Arc<dyn VideoGenerator>,
    pub thumbnails: Arc<dyn ThumbnailRenderer>,
    pub notifier: Notifier,
    shutdown: watch::Receiver<bool>,
}

impl PipelineContext {
    pub fn new(
        config: PipelineConfig,
        backend: Arc<dyn DocumentBackend>,
        storage: Arc<dyn ObjectStorage>,
        analyzer: Arc<dyn MediaAnalyzer>,
        generator: Arc<dyn VideoGenerator>,
    ) -> Self {
        let stores = Stores::new(backend);
        let thumbnails = Arc::new(PublicUrlThumbnails::new(
            Arc::clone(&storage),
            config.thumbnail_width,
            config.thumbnail_height,
        ));
        let notifier = Notifier::new(stores.notifications.clone());
        let (_, shutdown) = watch::channel(false);

        Self {
            config,
            stores,
            storage,
            analyzer,
            generator,
            thumbnails,
            notifier,
            shutdown,
        }
    }

    pub fn with_thumbnails(mut self, thumbnails: Arc<dyn ThumbnailRenderer>) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    /// Attach a process-wide shutdown signal; generation polling stops
    /// when it flips to true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }
}
