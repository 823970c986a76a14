//! Versioned record metadata shared by every persisted entity.
//!
//! The store owns the metadata: it assigns `id`, `owner_id`, `version` and
//! timestamps on create, and bumps `version` on every committed update.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job_status::JobProgress;

/// Field names that form the immutable facet of a stored record.
pub const IMMUTABLE_FIELDS: [&str; 3] = ["id", "owner_id", "created_at"];

/// Generate a fresh record identifier.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Store-managed metadata embedded (flattened) in every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecordMeta {
    /// Unique identifier, immutable once assigned
    #[serde(default)]
    pub id: String,
    /// Optimistic-lock token, starts at 1
    #[serde(default)]
    pub version: u64,
    /// Acting identity at creation time
    #[serde(default)]
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for RecordMeta {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            version: 0,
            owner_id: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl RecordMeta {
    /// Metadata for a record with a caller-chosen id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Metadata for a record created on behalf of `owner_id`.
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Default::default()
        }
    }
}

/// A record persisted in a named collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (table) name.
    const COLLECTION: &'static str;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Check required fields. Called by the store before insert.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn version(&self) -> u64 {
        self.meta().version
    }

    fn owner_id(&self) -> &str {
        &self.meta().owner_id
    }
}

/// An entity that moves through the job status machine.
pub trait TrackedJob: Entity {
    fn progress_state(&self) -> &JobProgress;

    fn progress_state_mut(&mut self) -> &mut JobProgress;

    fn is_terminal(&self) -> bool {
        self.progress_state().status.is_terminal()
    }
}
