//! Bounded retry for AI service calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::AiResult;

/// Run `operation`, retrying retryable errors with exponential backoff.
pub async fn with_retry<F, Fut, T>(max_retries: u32, base_delay: Duration, operation: F) -> AiResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AiResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = base_delay.saturating_mul(2u32.saturating_pow(attempt));
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "AI request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
