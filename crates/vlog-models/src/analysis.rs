//! Media analysis results.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, RecordMeta};
use crate::media::MediaKind;

/// Scene analysis for a single media item, as returned by the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAnalysis {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub kind: MediaKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(default)]
    pub landmarks: Vec<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub suggested_caption: String,
}

/// Aggregate over a batch of analyses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSummary {
    pub total_items: usize,
    pub successful_items: usize,
    pub failed_items: usize,
    pub unique_locations: Vec<String>,
    pub unique_activities: Vec<String>,
    pub overall_mood: String,
}

/// Persisted analytics record for one media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAnalytics {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub media_id: String,
    pub kind: MediaKind,
    pub description: String,
    pub objects: Vec<String>,
    pub landmarks: Vec<String>,
    pub activities: Vec<String>,
    pub mood: String,
    pub analyzed_at: DateTime<Utc>,
}

impl MediaAnalytics {
    /// Build the analytics record for an analysis of `media_id`.
    pub fn from_analysis(owner_id: impl Into<String>, analysis: &MediaAnalysis) -> Self {
        Self {
            meta: RecordMeta::owned_by(owner_id),
            media_id: analysis.file_id.clone(),
            kind: analysis.kind,
            description: analysis.description.clone(),
            objects: analysis.objects.clone(),
            landmarks: analysis.landmarks.clone(),
            activities: analysis.activities.clone(),
            mood: analysis.mood.clone(),
            analyzed_at: Utc::now(),
        }
    }
}

impl Entity for MediaAnalytics {
    const COLLECTION: &'static str = "media_analytics";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), String> {
        if self.media_id.is_empty() {
            return Err("media_id is required".to_string());
        }
        Ok(())
    }
}
