//! Derived vlog outputs: subtitles, analytics, title, share link and
//! thumbnail.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use vlog_models::{AnalysisSummary, MediaAnalysis, SubtitleEntry, VlogAnalytics, VlogRequest};
use vlog_storage::ObjectStorage;

use crate::error::PipelineResult;

const CAPTION_MAX_CHARS: usize = 50;
const CAPTION_KEEP_CHARS: usize = 47;

/// One subtitle per analyzed item, spread evenly over `duration_secs`.
///
/// Each entry ends half a second before the next slot starts. The text is
/// the suggested caption, or the description shortened to 47 characters.
pub fn build_subtitles(analyses: &[MediaAnalysis], duration_secs: f64) -> Vec<SubtitleEntry> {
    if analyses.is_empty() || duration_secs <= 0.0 {
        return Vec::new();
    }

    let slot = duration_secs / analyses.len() as f64;
    analyses
        .iter()
        .enumerate()
        .map(|(i, analysis)| {
            let start_time = i as f64 * slot;
            SubtitleEntry {
                start_time,
                end_time: start_time + slot - 0.5,
                text: caption_for(analysis),
            }
        })
        .collect()
}

fn caption_for(analysis: &MediaAnalysis) -> String {
    if !analysis.suggested_caption.is_empty() {
        return analysis.suggested_caption.clone();
    }
    let description = &analysis.description;
    if description.chars().count() > CAPTION_MAX_CHARS {
        let kept: String = description.chars().take(CAPTION_KEEP_CHARS).collect();
        format!("{}...", kept)
    } else {
        description.clone()
    }
}

/// Analytics block stored on the finished vlog.
pub fn build_analytics(summary: &AnalysisSummary, analyses: &[MediaAnalysis]) -> VlogAnalytics {
    let highlights = analyses
        .iter()
        .map(|a| a.suggested_caption.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    VlogAnalytics {
        locations: summary.unique_locations.clone(),
        activities: summary.unique_activities.clone(),
        mood: summary.overall_mood.clone(),
        highlights,
        media_count: summary.total_items,
        successful_items: summary.successful_items,
        failed_items: summary.failed_items,
    }
}

/// Title from the request, else from what the media shows.
pub fn derive_title(request: &VlogRequest, summary: &AnalysisSummary) -> String {
    if let Some(title) = request.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    if let Some(place) = summary.unique_locations.first() {
        return format!("Memories of {}", place);
    }
    if let Some(place) = request.destination.as_deref().filter(|d| !d.trim().is_empty()) {
        return format!("Trip to {}", place.trim());
    }
    match summary.unique_activities.as_slice() {
        [] => "My Travel Vlog".to_string(),
        [only] => format!("A day of {}", only),
        [first, second, ..] => format!("A day of {} and {}", first, second),
    }
}

pub fn derive_description(summary: &AnalysisSummary) -> String {
    let mut parts = Vec::new();

    let mood = if summary.overall_mood.is_empty() {
        "memorable".to_string()
    } else {
        summary.overall_mood.to_lowercase()
    };
    parts.push(format!(
        "A {} vlog made from {} moments",
        mood, summary.successful_items
    ));

    if !summary.unique_locations.is_empty() {
        parts.push(format!(
            "visiting {}",
            summary.unique_locations.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !summary.unique_activities.is_empty() {
        parts.push(format!(
            "featuring {}",
            summary.unique_activities.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    format!("{}.", parts.join(", "))
}

/// Share link with a fresh code.
pub fn share_url(base_url: &str, code: &str) -> String {
    format!("{}/share/{}", base_url.trim_end_matches('/'), code)
}

pub fn new_share_code() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Storage key of the generated video for a vlog job.
pub fn video_key(owner_id: &str, job_id: &str) -> String {
    format!("users/{}/vlogs/{}.mp4", owner_id, job_id)
}

// =============================================================================
// Thumbnails
// =============================================================================

/// Produces a poster image URL for a generated video.
///
/// Callers treat failures as non-fatal and store an empty URL.
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    async fn render(&self, owner_id: &str, job_id: &str, video_url: &str) -> PipelineResult<String>;
}

/// Serves thumbnails from a fixed key next to the video; the image itself is
/// produced by the CDN's frame extraction.
pub struct PublicUrlThumbnails {
    storage: Arc<dyn ObjectStorage>,
    width: u32,
    height: u32,
}

impl PublicUrlThumbnails {
    pub fn new(storage: Arc<dyn ObjectStorage>, width: u32, height: u32) -> Self {
        Self {
            storage,
            width,
            height,
        }
    }

    pub fn key(&self, owner_id: &str, job_id: &str) -> String {
        format!(
            "users/{}/vlogs/{}_{}x{}.jpg",
            owner_id, job_id, self.width, self.height
        )
    }
}

#[async_trait]
impl ThumbnailRenderer for PublicUrlThumbnails {
    async fn render(&self, owner_id: &str, job_id: &str, _video_url: &str) -> PipelineResult<String> {
        Ok(self.storage.public_url(&self.key(owner_id, job_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlog_storage::MemoryObjectStorage;

    fn analysis(caption: &str, description: &str) -> MediaAnalysis {
        MediaAnalysis {
            suggested_caption: caption.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_subtitle_slots() {
        let analyses = vec![analysis("Sunrise", ""), analysis("Temple", ""), analysis("Ramen", "")];
        let subs = build_subtitles(&analyses, 6.0);

        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].start_time, 0.0);
        assert_eq!(subs[0].end_time, 1.5);
        assert_eq!(subs[2].start_time, 4.0);
        assert_eq!(subs[2].end_time, 5.5);
        assert_eq!(subs[1].text, "Temple");
    }

    #[test]
    fn test_subtitle_falls_back_to_shortened_description() {
        let long = "a".repeat(60);
        let subs = build_subtitles(&[analysis("", &long), analysis("", "short")], 8.0);

        assert_eq!(subs[0].text.chars().count(), 50);
        assert!(subs[0].text.ends_with("..."));
        assert_eq!(subs[1].text, "short");
        assert!(build_subtitles(&[], 8.0).is_empty());
    }

    #[test]
    fn test_analytics_highlights_from_captions() {
        let summary = AnalysisSummary {
            total_items: 3,
            successful_items: 2,
            failed_items: 1,
            unique_locations: vec!["Kyoto".into()],
            unique_activities: vec!["hiking".into()],
            overall_mood: "calm".into(),
        };
        let analytics = build_analytics(&summary, &[analysis("Morning walk", ""), analysis(" ", "x")]);

        assert_eq!(analytics.highlights, vec!["Morning walk".to_string()]);
        assert_eq!(analytics.media_count, 3);
        assert_eq!(analytics.failed_items, 1);
        assert_eq!(analytics.mood, "calm");
    }

    #[test]
    fn test_title_precedence() {
        let mut summary = AnalysisSummary {
            unique_activities: vec!["surfing".into(), "hiking".into()],
            ..Default::default()
        };
        let mut request = VlogRequest::default();
        assert_eq!(derive_title(&request, &summary), "A day of surfing and hiking");

        request.destination = Some("Bali".into());
        assert_eq!(derive_title(&request, &summary), "Trip to Bali");

        summary.unique_locations = vec!["Uluwatu".into()];
        assert_eq!(derive_title(&request, &summary), "Memories of Uluwatu");

        request.title = Some("Bali 2026".into());
        assert_eq!(derive_title(&request, &summary), "Bali 2026");
    }

    #[test]
    fn test_description_mentions_places() {
        let summary = AnalysisSummary {
            successful_items: 2,
            unique_locations: vec!["Kyoto".into(), "Nara".into()],
            overall_mood: "Joyful".into(),
            ..Default::default()
        };
        assert_eq!(
            derive_description(&summary),
            "A joyful vlog made from 2 moments, visiting Kyoto, Nara."
        );
    }

    #[test]
    fn test_share_url() {
        assert_eq!(share_url("https://app.example/", "abc"), "https://app.example/share/abc");
        assert_eq!(new_share_code().len(), 32);
        assert_ne!(new_share_code(), new_share_code());
    }

    #[tokio::test]
    async fn test_public_url_thumbnail() {
        let renderer = PublicUrlThumbnails::new(Arc::new(MemoryObjectStorage::new()), 1280, 720);
        let url = renderer.render("u1", "v1", "ignored").await.unwrap();
        assert_eq!(url, "memory://local/users/u1/vlogs/v1_1280x720.jpg");
    }
}
