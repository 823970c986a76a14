//! Shared data models for the vlog generation backend.
//!
//! This crate provides Serde-serializable types for:
//! - Versioned records and their store metadata
//! - Vlog and media jobs with their status machine
//! - Media analysis results and analytics records
//! - Owner notifications
//! - Queue task payloads
//! - Status feed snapshots

pub mod analysis;
pub mod entity;
pub mod job_status;
pub mod media;
pub mod notification;
pub mod status_feed;
pub mod task;
pub mod vlog;

// Re-export common types
pub use analysis::{AnalysisSummary, MediaAnalysis, MediaAnalytics};
pub use entity::{new_record_id, Entity, RecordMeta, TrackedJob};
pub use job_status::{JobProgress, JobStatus};
pub use media::{MediaJob, MediaKind};
pub use notification::{Notification, NotificationKind};
pub use status_feed::{FeedEvent, StatusSnapshot};
pub use task::{MediaAnalysisTask, TaskKind, TaskPayload, VlogTask};
pub use vlog::{
    MediaItem, SubtitleEntry, VlogAnalytics, VlogJob, VlogOutput, VlogRequest, VlogStyle,
};
