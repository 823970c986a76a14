//! Owner notifications emitted on terminal job transitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entity::{Entity, RecordMeta};

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MediaCompleted,
    MediaFailed,
    VlogCompleted,
    VlogFailed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::MediaCompleted => "media_completed",
            NotificationKind::MediaFailed => "media_failed",
            NotificationKind::VlogCompleted => "vlog_completed",
            NotificationKind::VlogFailed => "vlog_failed",
        }
    }
}

/// A message addressed to a job owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Notification {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub kind: NotificationKind,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub vlog_id: Option<String>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    fn new(
        owner_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            meta: RecordMeta::owned_by(owner_id),
            kind,
            title: title.into(),
            message: message.into(),
            media_id: None,
            vlog_id: None,
            read: false,
        }
    }

    pub fn vlog_completed(owner_id: impl Into<String>, vlog_id: impl Into<String>, title: &str) -> Self {
        let mut n = Self::new(
            owner_id,
            NotificationKind::VlogCompleted,
            "Your vlog is ready",
            format!("\"{}\" has finished generating.", title),
        );
        n.vlog_id = Some(vlog_id.into());
        n
    }

    pub fn vlog_failed(owner_id: impl Into<String>, vlog_id: impl Into<String>, error: &str) -> Self {
        let mut n = Self::new(
            owner_id,
            NotificationKind::VlogFailed,
            "Vlog generation failed",
            format!("We could not generate your vlog: {}", error),
        );
        n.vlog_id = Some(vlog_id.into());
        n
    }

    pub fn media_completed(owner_id: impl Into<String>, media_id: impl Into<String>, file_name: &str) -> Self {
        let mut n = Self::new(
            owner_id,
            NotificationKind::MediaCompleted,
            "Media analysis complete",
            format!("{} has been analyzed.", file_name),
        );
        n.media_id = Some(media_id.into());
        n
    }

    pub fn media_failed(owner_id: impl Into<String>, media_id: impl Into<String>, error: &str) -> Self {
        let mut n = Self::new(
            owner_id,
            NotificationKind::MediaFailed,
            "Media analysis failed",
            format!("We could not analyze your media: {}", error),
        );
        n.media_id = Some(media_id.into());
        n
    }
}

impl Entity for Notification {
    const COLLECTION: &'static str = "notifications";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), String> {
        Validate::validate(self).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlog_notifications_reference_vlog() {
        let n = Notification::vlog_completed("u1", "v1", "Kyoto");
        assert_eq!(n.kind, NotificationKind::VlogCompleted);
        assert_eq!(n.vlog_id.as_deref(), Some("v1"));
        assert!(n.media_id.is_none());
        assert!(!n.read);
        assert!(Entity::validate(&n).is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_title() {
        let mut n = Notification::media_failed("u1", "m1", "boom");
        n.title.clear();
        let err = Entity::validate(&n).unwrap_err();
        assert!(err.contains("title"));
    }

    #[test]
    fn test_kind_wire_name() {
        let json = serde_json::to_string(&NotificationKind::MediaFailed).unwrap();
        assert_eq!(json, "\"media_failed\"");
        assert_eq!(NotificationKind::VlogFailed.as_str(), "vlog_failed");
    }
}
