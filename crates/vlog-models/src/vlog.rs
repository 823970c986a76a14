//! Vlog job records and their request/output payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, RecordMeta, TrackedJob};
use crate::job_status::{JobProgress, JobStatus};
use crate::media::MediaKind;

/// A media reference submitted for a vlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaItem {
    /// Media record id (used as the analytics key)
    pub file_id: String,
    /// Storage location of the bytes
    pub url: String,
    pub kind: MediaKind,
    /// MIME type hint
    #[serde(default)]
    pub content_type: Option<String>,
    /// Capture time, ISO 8601
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub order: u32,
}

/// Style settings for generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VlogStyle {
    /// adventure / relaxing / romantic / family
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub music_mood: Option<String>,
    /// Target duration in seconds
    #[serde(default)]
    pub duration: Option<u32>,
    /// fade / slide / zoom
    #[serde(default)]
    pub transition: Option<String>,
    /// e.g. "16:9"
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

/// Everything the pipeline needs to generate one vlog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VlogRequest {
    pub media_items: Vec<MediaItem>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    /// YYYY-MM-DD
    #[serde(default)]
    pub travel_date: Option<String>,
    #[serde(default)]
    pub style: VlogStyle,
}

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleEntry {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

/// Aggregate analytics shown alongside a finished vlog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VlogAnalytics {
    pub locations: Vec<String>,
    pub activities: Vec<String>,
    pub mood: String,
    pub highlights: Vec<String>,
    pub media_count: usize,
    pub successful_items: usize,
    pub failed_items: usize,
}

/// Outputs written on the Completed transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VlogOutput {
    pub video_id: String,
    pub video_url: String,
    pub share_url: String,
    pub thumbnail_url: String,
    pub duration: f64,
    pub title: String,
    pub description: String,
    pub subtitles: Vec<SubtitleEntry>,
    pub analytics: VlogAnalytics,
}

/// A generated vlog tracked from submission to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VlogJob {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub state: JobProgress,
    pub request: VlogRequest,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subtitles: Vec<SubtitleEntry>,
    #[serde(default)]
    pub analytics: Option<VlogAnalytics>,
}

impl VlogJob {
    /// Create a pending vlog job for `owner_id`.
    pub fn new(owner_id: impl Into<String>, request: VlogRequest) -> Self {
        let title = request.title.clone();
        Self {
            meta: RecordMeta::owned_by(owner_id),
            state: JobProgress::with_status(JobStatus::Pending),
            request,
            video_id: None,
            video_url: None,
            share_url: None,
            thumbnail_url: None,
            duration: 0.0,
            title,
            description: None,
            subtitles: Vec::new(),
            analytics: None,
        }
    }

    /// Copy generation outputs onto the record.
    pub fn apply_output(&mut self, output: VlogOutput) {
        self.video_id = Some(output.video_id);
        self.video_url = Some(output.video_url);
        self.share_url = Some(output.share_url);
        self.thumbnail_url = Some(output.thumbnail_url);
        self.duration = output.duration;
        self.title = Some(output.title);
        self.description = Some(output.description);
        self.subtitles = output.subtitles;
        self.analytics = Some(output.analytics);
    }
}

impl Entity for VlogJob {
    const COLLECTION: &'static str = "vlogs";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

impl TrackedJob for VlogJob {
    fn progress_state(&self) -> &JobProgress {
        &self.state
    }

    fn progress_state_mut(&mut self) -> &mut JobProgress {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VlogRequest {
        VlogRequest {
            media_items: vec![MediaItem {
                file_id: "m1".into(),
                url: "users/u1/media/m1.jpg".into(),
                kind: MediaKind::Image,
                content_type: Some("image/jpeg".into()),
                timestamp: None,
                order: 0,
            }],
            title: Some("Kyoto".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_vlog_is_pending() {
        let job = VlogJob::new("u1", request());
        assert_eq!(job.state.status, JobStatus::Pending);
        assert_eq!(job.state.progress, 0.0);
        assert_eq!(job.owner_id(), "u1");
        assert_eq!(job.title.as_deref(), Some("Kyoto"));
        assert!(job.id().is_empty());
    }

    #[test]
    fn test_record_flattens_meta_and_state() {
        let job = VlogJob::new("u1", request());
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["owner_id"], "u1");
        assert_eq!(value["status"], "pending");
        assert!(value.get("error_message").is_none());

        let back: VlogJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_apply_output() {
        let mut job = VlogJob::new("u1", request());
        job.apply_output(VlogOutput {
            video_id: "v1".into(),
            video_url: "https://cdn/v1.mp4".into(),
            duration: 8.0,
            ..Default::default()
        });

        assert_eq!(job.video_url.as_deref(), Some("https://cdn/v1.mp4"));
        assert_eq!(job.duration, 8.0);
        assert!(job.analytics.is_some());
    }
}
