//! Uploaded media records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, RecordMeta, TrackedJob};
use crate::job_status::{JobProgress, JobStatus};
use crate::vlog::MediaItem;

/// Kind of uploaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Infer the kind from a MIME type. Anything that is not `video/*` is
    /// treated as an image.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.trim().to_ascii_lowercase().starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One uploaded photo or video and its analysis status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaJob {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub state: JobProgress,
    pub file_name: String,
    pub content_type: String,
    pub kind: MediaKind,
    /// Size in bytes
    pub size: u64,
    /// Storage key of the uploaded bytes
    #[serde(default)]
    pub url: Option<String>,
}

impl MediaJob {
    /// Create a media record in the `Uploading` phase.
    pub fn uploading(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
    ) -> Self {
        let content_type = content_type.into();
        Self {
            meta: RecordMeta::owned_by(owner_id),
            state: JobProgress::with_status(JobStatus::Uploading),
            file_name: file_name.into(),
            kind: MediaKind::from_content_type(&content_type),
            content_type,
            size,
            url: None,
        }
    }

    /// Reference used by the analysis orchestrator, if the bytes are stored.
    pub fn to_item(&self, order: u32) -> Option<MediaItem> {
        let url = self.url.as_ref().filter(|u| !u.is_empty())?;
        Some(MediaItem {
            file_id: self.meta.id.clone(),
            url: url.clone(),
            kind: self.kind,
            content_type: Some(self.content_type.clone()),
            timestamp: None,
            order,
        })
    }
}

impl Entity for MediaJob {
    const COLLECTION: &'static str = "medias";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), String> {
        if self.content_type.trim().is_empty() {
            return Err("content_type is required".to_string());
        }
        Ok(())
    }
}

impl TrackedJob for MediaJob {
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

    #[test]
    fn test_kind_from_content_type() {
        assert_eq!(MediaKind::from_content_type("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_content_type("VIDEO/quicktime"), MediaKind::Video);
        assert_eq!(MediaKind::from_content_type("image/heic"), MediaKind::Image);
        assert_eq!(MediaKind::from_content_type(""), MediaKind::Image);
    }

    #[test]
    fn test_uploading_media() {
        let media = MediaJob::uploading("u1", "beach.mov", "video/quicktime", 1024);
        assert_eq!(media.state.status, JobStatus::Uploading);
        assert_eq!(media.kind, MediaKind::Video);
        assert!(media.to_item(0).is_none());
    }

    #[test]
    fn test_to_item_requires_url() {
        let mut media = MediaJob::uploading("u1", "a.jpg", "image/jpeg", 10);
        media.meta.id = "m1".into();
        media.url = Some("users/u1/media/m1.jpg".into());

        let item = media.to_item(2).unwrap();
        assert_eq!(item.file_id, "m1");
        assert_eq!(item.order, 2);
        assert_eq!(item.content_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_validate_requires_content_type() {
        let media = MediaJob::uploading("u1", "a", " ", 0);
        assert!(media.validate().is_err());
    }
}
