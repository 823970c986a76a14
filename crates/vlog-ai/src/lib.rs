//! Clients for the external AI services.
//!
//! This crate provides:
//! - [`MediaAnalyzer`] and a Gemini `generateContent` implementation
//! - [`VideoGenerator`] and a Vertex AI Veo long-running implementation
//! - Prompt builders for analysis and generation
//! - Duration snapping for the generation model

pub mod analyzer;
pub mod error;
pub mod prompt;
pub mod retry;
pub mod video;

pub use analyzer::{GeminiAnalyzer, GeminiConfig, MediaAnalyzer};
pub use error::{AiError, AiResult};
pub use prompt::{build_analysis_prompt, build_vlog_prompt};
pub use video::{
    snap_duration, GenerationRequest, OperationHandle, OperationStatus, VeoClient, VeoConfig,
    VideoGenerator, DEFAULT_ASPECT_RATIO, SUPPORTED_DURATIONS,
};
