//! Transport retry with exponential backoff and jitter.
//!
//! Only transport-level failures are retried (network, 429, 5xx). Version
//! conflicts are never retried here; they belong to the caller.

use std::future::Future;
use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::StoreResult;
use crate::metrics::record_retry;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: std::env::var("STORE_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay_ms: std::env::var("STORE_RETRY_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: std::env::var("STORE_RETRY_MAX_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_delay_ms),
        }
    }
}

/// Run `op`, retrying retryable failures up to `config.max_retries` times.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> StoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        let span = info_span!("store_retry", operation = %operation, attempt = attempt + 1);
        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());
                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Store operation failed, retrying"
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after);
    }

    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp_delay.min(config.max_delay_ms);

    // Full jitter from the clock's sub-second nanos
    let jittered = if capped > 0 {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        ((capped as f64) * ((nanos % 1000) as f64 / 1000.0)) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms))
}
