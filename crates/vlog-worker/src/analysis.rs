//! Media analysis orchestration.
//!
//! Items are analyzed one after another:
//! - bytes are downloaded from object storage and sent to the analyzer
//! - a failing item is counted and skipped, never aborting the batch
//! - each success is persisted as a `MediaAnalytics` record (best-effort)
//! - the batch fails with `NoUsableMedia` only if every item failed

use std::collections::HashMap;

use tracing::{debug, info, warn};

use vlog_models::{AnalysisSummary, MediaAnalysis, MediaAnalytics, MediaItem};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_analysis_item;

/// Successful analyses in input order plus the aggregate summary.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analyses: Vec<MediaAnalysis>,
    pub summary: AnalysisSummary,
}

/// Analyze `items` for `owner_id`.
pub async fn analyze_items(
    ctx: &PipelineContext,
    owner_id: &str,
    items: &[MediaItem],
) -> PipelineResult<AnalysisOutcome> {
    let mut analyses = Vec::with_capacity(items.len());
    let mut failed = 0usize;

    for (index, item) in items.iter().enumerate() {
        match analyze_one(ctx, item).await {
            Ok(analysis) => {
                record_analysis_item(true);
                debug!(
                    owner_id = %owner_id,
                    file_id = %item.file_id,
                    index = index,
                    "Media item analyzed"
                );
                persist_analytics(ctx, owner_id, &analysis).await;
                analyses.push(analysis);
            }
            Err(e) => {
                record_analysis_item(false);
                failed += 1;
                warn!(
                    owner_id = %owner_id,
                    file_id = %item.file_id,
                    index = index,
                    error = %e,
                    "Media item analysis failed, skipping"
                );
            }
        }
    }

    if analyses.is_empty() {
        return Err(PipelineError::NoUsableMedia(items.len()));
    }

    let summary = summarize(&analyses, items.len(), failed);
    info!(
        owner_id = %owner_id,
        total = summary.total_items,
        successful = summary.successful_items,
        failed = summary.failed_items,
        "Media analysis finished"
    );

    Ok(AnalysisOutcome { analyses, summary })
}

/// Download and analyze a single item.
pub async fn analyze_one(ctx: &PipelineContext, item: &MediaItem) -> PipelineResult<MediaAnalysis> {
    if item.url.trim().is_empty() {
        return Err(PipelineError::invalid_input(format!(
            "media {} has no location",
            item.file_id
        )));
    }

    let data = ctx.storage.download(&item.url).await?;
    let mut analysis = ctx.analyzer.analyze(item, data).await?;
    analysis.file_id = item.file_id.clone();
    analysis.kind = item.kind;
    Ok(analysis)
}

/// Store (or refresh) the analytics record keyed by the media id.
pub(crate) async fn persist_analytics(ctx: &PipelineContext, owner_id: &str, analysis: &MediaAnalysis) {
    let repo = &ctx.stores.analytics;
    let mut record = MediaAnalytics::from_analysis(owner_id, analysis);
    record.meta.id = analysis.file_id.clone();

    let result = match repo.find(&analysis.file_id).await {
        Ok(Some(existing)) => {
            record.meta = existing.meta;
            repo.update(&record).await.map(|_| ())
        }
        Ok(None) => repo.create(owner_id, record).await.map(|_| ()),
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        warn!(
            owner_id = %owner_id,
            media_id = %analysis.file_id,
            error = %e,
            "Failed to persist media analytics"
        );
    }
}

/// Aggregate successful analyses.
///
/// Locations and activities keep first-seen order. The overall mood is the
/// most frequent non-empty mood; ties go to the one seen first.
pub fn summarize(analyses: &[MediaAnalysis], total_items: usize, failed_items: usize) -> AnalysisSummary {
    let mut unique_locations = Vec::new();
    let mut unique_activities = Vec::new();

    for analysis in analyses {
        push_unique(&mut unique_locations, &analysis.landmarks);
        push_unique(&mut unique_activities, &analysis.activities);
    }

    AnalysisSummary {
        total_items,
        successful_items: analyses.len(),
        failed_items,
        unique_locations,
        unique_activities,
        overall_mood: dominant_mood(analyses),
    }
}

fn push_unique(into: &mut Vec<String>, values: &[String]) {
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !into.iter().any(|v| v == value) {
            into.push(value.to_string());
        }
    }
}

fn dominant_mood(analyses: &[MediaAnalysis]) -> String {
    // mood -> (count, first index)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, analysis) in analyses.iter().enumerate() {
        let mood = analysis.mood.trim();
        if mood.is_empty() {
            continue;
        }
        counts.entry(mood).or_insert((0, index)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(mood, _)| mood.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(landmarks: &[&str], activities: &[&str], mood: &str) -> MediaAnalysis {
        MediaAnalysis {
            landmarks: landmarks.iter().map(|s| s.to_string()).collect(),
            activities: activities.iter().map(|s| s.to_string()).collect(),
            mood: mood.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_uniques_keep_first_seen_order() {
        let analyses = vec![
            analysis(&["Kinkaku-ji", "Gion"], &["walking"], "calm"),
            analysis(&["Gion", "Arashiyama"], &["eating", "walking"], "happy"),
        ];
        let summary = summarize(&analyses, 3, 1);

        assert_eq!(summary.unique_locations, vec!["Kinkaku-ji", "Gion", "Arashiyama"]);
        assert_eq!(summary.unique_activities, vec!["walking", "eating"]);
        assert_eq!(summary.successful_items, 2);
        assert_eq!(summary.failed_items, 1);
        assert_eq!(summary.total_items, 3);
    }

    #[test]
    fn test_mood_tie_goes_to_first_seen() {
        let analyses = vec![
            analysis(&[], &[], "calm"),
            analysis(&[], &[], "happy"),
            analysis(&[], &[], "happy"),
            analysis(&[], &[], "calm"),
        ];
        assert_eq!(summarize(&analyses, 4, 0).overall_mood, "calm");
    }

    #[test]
    fn test_mood_most_frequent_wins_and_ignores_empty() {
        let analyses = vec![
            analysis(&[], &[], ""),
            analysis(&[], &[], "calm"),
            analysis(&[], &[], "happy"),
            analysis(&[], &[], "happy"),
            analysis(&[], &[], " "),
        ];
        assert_eq!(summarize(&analyses, 5, 0).overall_mood, "happy");
        assert_eq!(summarize(&[analysis(&[], &[], "")], 1, 0).overall_mood, "");
    }
}
