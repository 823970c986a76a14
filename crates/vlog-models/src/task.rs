//! Task payloads handed to the dispatcher and the external queue.
//!
//! The wire shape is `{ "id", "version", "type", "data" }` where `type`
//! selects the payload variant. Decoding happens once at the dispatcher
//! boundary so the pipeline only ever sees concrete types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::vlog::VlogRequest;

/// Run the vlog generation pipeline for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VlogTask {
    pub owner_id: String,
    pub request: VlogRequest,
}

/// Analyze a set of uploaded media records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAnalysisTask {
    pub owner_id: String,
    pub media_ids: Vec<String>,
}

/// Tagged task variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data")]
pub enum TaskKind {
    #[serde(rename = "ProcessVLogTask")]
    GenerateVlog(VlogTask),
    #[serde(rename = "ProcessMediaAnalysisTask")]
    AnalyzeMedia(MediaAnalysisTask),
}

impl TaskKind {
    /// Wire name of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskKind::GenerateVlog(_) => "ProcessVLogTask",
            TaskKind::AnalyzeMedia(_) => "ProcessMediaAnalysisTask",
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            TaskKind::GenerateVlog(t) => &t.owner_id,
            TaskKind::AnalyzeMedia(t) => &t.owner_id,
        }
    }
}

/// A unit of pipeline work addressed to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskPayload {
    /// Record id the task drives (vlog id, or the first media id)
    pub id: String,
    /// Record version observed at submission
    pub version: u64,
    #[serde(flatten)]
    pub kind: TaskKind,
}

impl TaskPayload {
    pub fn generate_vlog(id: impl Into<String>, version: u64, task: VlogTask) -> Self {
        Self {
            id: id.into(),
            version,
            kind: TaskKind::GenerateVlog(task),
        }
    }

    pub fn analyze_media(id: impl Into<String>, version: u64, task: MediaAnalysisTask) -> Self {
        Self {
            id: id.into(),
            version,
            kind: TaskKind::AnalyzeMedia(task),
        }
    }

    /// Key for queue-level deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}:{}", self.kind.type_name(), self.id, self.version)
    }

    /// Webhook path that runs this task.
    pub fn webhook_path(&self) -> &'static str {
        match self.kind {
            TaskKind::GenerateVlog(_) => "/internal/tasks/create-vlog",
            TaskKind::AnalyzeMedia(_) => "/internal/tasks/analyze-media",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlog_payload() -> TaskPayload {
        TaskPayload::generate_vlog(
            "vlog-1",
            1,
            VlogTask {
                owner_id: "u1".into(),
                request: VlogRequest::default(),
            },
        )
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(vlog_payload()).unwrap();
        assert_eq!(value["id"], "vlog-1");
        assert_eq!(value["version"], 1);
        assert_eq!(value["type"], "ProcessVLogTask");
        assert_eq!(value["data"]["owner_id"], "u1");
    }

    #[test]
    fn test_decode_media_task() {
        let json = r#"{
            "id": "m1",
            "version": 2,
            "type": "ProcessMediaAnalysisTask",
            "data": { "owner_id": "u1", "media_ids": ["m1", "m2"] }
        }"#;
        let payload: TaskPayload = serde_json::from_str(json).unwrap();

        match &payload.kind {
            TaskKind::AnalyzeMedia(t) => assert_eq!(t.media_ids.len(), 2),
            other => panic!("unexpected task {:?}", other),
        }
        assert_eq!(payload.kind.owner_id(), "u1");
        assert_eq!(payload.webhook_path(), "/internal/tasks/analyze-media");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"id":"x","version":1,"type":"Nope","data":{}}"#;
        assert!(serde_json::from_str::<TaskPayload>(json).is_err());
    }

    #[test]
    fn test_idempotency_key_includes_version() {
        let mut payload = vlog_payload();
        let first = payload.idempotency_key();
        payload.version = 2;
        assert_ne!(first, payload.idempotency_key());
        assert!(first.starts_with("ProcessVLogTask:vlog-1:"));
    }
}
