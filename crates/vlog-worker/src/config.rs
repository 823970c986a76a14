//! Pipeline, dispatch and relay configuration.

use std::time::Duration;

/// How submitted jobs reach a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Spawn the pipeline on a tokio task in this process
    InProcess,
    /// Enqueue a task payload for the relay
    Queue,
}

impl DispatchMode {
    /// `in_process` for `ENVIRONMENT=local`, `queue` otherwise.
    ///
    /// `DISPATCH_MODE` overrides the environment-based choice.
    pub fn from_env() -> Self {
        if let Ok(mode) = std::env::var("DISPATCH_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "in_process" | "inprocess" | "local" => return Self::InProcess,
                "queue" => return Self::Queue,
                _ => {}
            }
        }

        match std::env::var("ENVIRONMENT") {
            Ok(env) if env.eq_ignore_ascii_case("local") => Self::InProcess,
            _ => Self::Queue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::InProcess => "in_process",
            DispatchMode::Queue => "queue",
        }
    }
}

/// Vlog and media pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on media items per vlog request
    pub max_media_items: usize,
    /// Duration used when the request does not set one
    pub default_duration_secs: u32,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// Delay between generation status polls
    pub poll_interval: Duration,
    /// Client-side limit on waiting for a generation to finish
    pub max_wait: Duration,
    /// Prefix for share links
    pub share_base_url: String,
    /// Conditional-write attempts for terminal transitions
    pub finalize_attempts: u32,
    /// How long a Processing job belongs to the run that started it.
    /// Redeliveries inside this window are refused, later ones resume.
    pub processing_lease: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_media_items: 50,
            default_duration_secs: 8,
            thumbnail_width: 1280,
            thumbnail_height: 720,
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(120),
            share_base_url: "http://localhost:3000".to_string(),
            finalize_attempts: 2,
            processing_lease: Duration::from_secs(1800),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_media_items: std::env::var("VLOG_MAX_MEDIA_ITEMS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_media_items),
            default_duration_secs: std::env::var("VLOG_DEFAULT_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_duration_secs),
            thumbnail_width: std::env::var("VLOG_THUMBNAIL_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.thumbnail_width),
            thumbnail_height: std::env::var("VLOG_THUMBNAIL_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.thumbnail_height),
            poll_interval: Duration::from_secs(
                std::env::var("VLOG_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            max_wait: Duration::from_secs(
                std::env::var("VLOG_MAX_WAIT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            share_base_url: std::env::var("SHARE_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.share_base_url),
            finalize_attempts: std::env::var("VLOG_FINALIZE_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.finalize_attempts),
            processing_lease: std::env::var("VLOG_PROCESSING_LEASE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.processing_lease),
        }
    }
}

/// Queue relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the API that serves the task webhooks
    pub webhook_base_url: String,
    /// Maximum webhook calls in flight
    pub max_concurrent_tasks: usize,
    /// Per-call timeout; a vlog pipeline can run for minutes
    pub webhook_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often to scan for tasks left pending by a crashed relay
    pub claim_interval: Duration,
    /// XREADGROUP block time
    pub block_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webhook_base_url: "http://localhost:8080".to_string(),
            max_concurrent_tasks: 4,
            webhook_timeout: Duration::from_secs(900),
            shutdown_timeout: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            block_ms: 1000,
        }
    }
}

impl RelayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            webhook_base_url: std::env::var("RELAY_WEBHOOK_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            max_concurrent_tasks: std::env::var("RELAY_MAX_TASKS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            webhook_timeout: Duration::from_secs(
                std::env::var("RELAY_WEBHOOK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("RELAY_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            claim_interval: Duration::from_secs(
                std::env::var("RELAY_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            block_ms: std::env::var("RELAY_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        }
    }
}
