//! Prompt construction for analysis and generation.

use vlog_models::{MediaAnalysis, MediaKind, VlogStyle};

const MAX_PROMPT_LANDMARKS: usize = 3;
const MAX_PROMPT_ACTIVITIES: usize = 3;

/// Instruction sent alongside each media item.
pub fn build_analysis_prompt(kind: MediaKind) -> String {
    let subject = match kind {
        MediaKind::Image => "photo",
        MediaKind::Video => "video clip",
    };

    format!(
        r#"You are analyzing a {subject} taken during a trip.
Return ONLY a single JSON object with this schema:
{{
  "description": "One or two sentences describing the scene",
  "objects": ["notable objects"],
  "landmarks": ["named places or landmarks, empty if none"],
  "activities": ["what people are doing"],
  "mood": "one word for the atmosphere",
  "suggested_caption": "A short caption suitable for a travel vlog subtitle"
}}
Use English. Do not guess landmark names you cannot recognize."#
    )
}

/// Theme keyword to style phrase.
fn theme_description(theme: &str) -> Option<&'static str> {
    match theme {
        "adventure" => Some("exciting and adventurous"),
        "relaxing" => Some("calm and peaceful"),
        "romantic" => Some("warm and romantic"),
        "family" => Some("joyful and family-friendly"),
        _ => None,
    }
}

/// Build the text-to-video prompt from successful analyses.
///
/// Uses at most three landmarks and three activities (in analysis order),
/// the first non-empty mood and the style theme when it is a known one.
pub fn build_vlog_prompt(analyses: &[MediaAnalysis], style: &VlogStyle) -> String {
    let mut prompt = String::from("Create a beautiful travel vlog video. ");

    let landmarks: Vec<&str> = analyses
        .iter()
        .flat_map(|a| a.landmarks.iter().map(String::as_str))
        .take(MAX_PROMPT_LANDMARKS)
        .collect();
    if !landmarks.is_empty() {
        prompt.push_str(&format!("Feature these locations: {}. ", landmarks.join(", ")));
    }

    let activities: Vec<&str> = analyses
        .iter()
        .flat_map(|a| a.activities.iter().map(String::as_str))
        .take(MAX_PROMPT_ACTIVITIES)
        .collect();
    if !activities.is_empty() {
        prompt.push_str(&format!("Show activities like: {}. ", activities.join(", ")));
    }

    if let Some(mood) = analyses.iter().map(|a| a.mood.as_str()).find(|m| !m.is_empty()) {
        prompt.push_str(&format!("The overall mood should be {}. ", mood));
    }

    if let Some(desc) = style.theme.as_deref().and_then(theme_description) {
        prompt.push_str(&format!("Style: {}. ", desc));
    }

    prompt.push_str("Use smooth camera movements, vibrant colors, and cinematic transitions. ");
    prompt.push_str("Professional travel documentary style with natural lighting. ");
    prompt.push_str("Make it feel like a professional travel vlog that captures the essence of the journey.");
    prompt
}
