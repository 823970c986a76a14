//! Queue relay.
//!
//! Reads task payloads from the Redis stream and delivers them to the API's
//! task webhooks. Deliveries are bounded by a semaphore:
//! - success acks the message and clears its dedup key
//! - a client error (4xx) moves the message to the DLQ at once
//! - other failures bump the retry counter; the message stays pending and
//!   is reclaimed later, until `max_retries` sends it to the DLQ
//! - a message is never reclaimed while its webhook call may still be open

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vlog_models::TaskPayload;
use vlog_queue::TaskQueue;

use crate::config::RelayConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_relay_delivery;

/// Slack between a webhook call timing out and its message becoming
/// claimable by another consumer.
const CLAIM_MARGIN: Duration = Duration::from_secs(60);

/// Idle time after which a pending message may be reclaimed.
///
/// Never shorter than the webhook timeout plus [`CLAIM_MARGIN`].
pub fn reclaim_idle(visibility_timeout: Duration, webhook_timeout: Duration) -> Duration {
    visibility_timeout.max(webhook_timeout + CLAIM_MARGIN)
}

/// Why a delivery did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Worth retrying later
    Transient(String),
    /// The webhook rejected the payload itself
    Permanent(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Transient(msg) => write!(f, "transient delivery failure: {}", msg),
            DeliveryError::Permanent(msg) => write!(f, "permanent delivery failure: {}", msg),
        }
    }
}

// =============================================================================
// Webhook client
// =============================================================================

/// POSTs task payloads to `{base_url}{webhook_path}`.
#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebhookClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::dispatch_failure(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, payload: &TaskPayload) -> String {
        format!("{}{}", self.base_url, payload.webhook_path())
    }

    pub async fn deliver(&self, payload: &TaskPayload) -> Result<(), DeliveryError> {
        let url = self.url_for(payload);
        let response = self
            .http
            .post(&url)
            .header("X-Task-Type", payload.kind.type_name())
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("{} returned {}: {}", url, status.as_u16(), body);
        if status.is_client_error()
            && status != reqwest::StatusCode::REQUEST_TIMEOUT
            && status != reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            Err(DeliveryError::Permanent(message))
        } else {
            Err(DeliveryError::Transient(message))
        }
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Relay loop over the task stream.
pub struct RelayExecutor {
    config: RelayConfig,
    queue: Arc<TaskQueue>,
    webhook: WebhookClient,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
    claim_idle: Duration,
}

impl RelayExecutor {
    pub fn new(config: RelayConfig, queue: TaskQueue) -> PipelineResult<Self> {
        let webhook = WebhookClient::new(config.webhook_base_url.clone(), config.webhook_timeout)?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        let (shutdown, _) = watch::channel(false);

        let visibility_timeout = queue.config().visibility_timeout;
        let claim_idle = reclaim_idle(visibility_timeout, config.webhook_timeout);
        if claim_idle > visibility_timeout {
            warn!(
                visibility_timeout_secs = visibility_timeout.as_secs(),
                webhook_timeout_secs = config.webhook_timeout.as_secs(),
                claim_idle_secs = claim_idle.as_secs(),
                "Visibility timeout is shorter than the webhook timeout, raising reclaim idle time"
            );
        }

        Ok(Self {
            config,
            queue: Arc::new(queue),
            webhook,
            semaphore,
            shutdown,
            consumer_name: format!("relay-{}", Uuid::new_v4()),
            claim_idle,
        })
    }

    /// Handle that stops [`RelayExecutor::run`] when sent `true`.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    pub async fn run(&self) -> PipelineResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_tasks = self.config.max_concurrent_tasks,
            webhook_base = %self.config.webhook_base_url,
            "Starting queue relay"
        );

        self.queue.init().await?;

        let claim_task = self.spawn_reclaimer();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping relay");
                        break;
                    }
                }
                result = self.consume_batch() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error consuming tasks");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight deliveries");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_deliveries()).await;

        info!("Queue relay stopped");
        Ok(())
    }

    fn spawn_reclaimer(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let webhook = self.webhook.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let consumer = self.consumer_name.clone();
        let interval = self.config.claim_interval;
        let claim_idle = self.claim_idle;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match queue.claim_pending(&consumer, 5, claim_idle).await {
                            Ok(tasks) if !tasks.is_empty() => {
                                info!(count = tasks.len(), "Reclaimed pending tasks");
                                for (message_id, payload) in tasks {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let queue = Arc::clone(&queue);
                                    let webhook = webhook.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        relay_one(&queue, &webhook, &message_id, &payload).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "Failed to reclaim pending tasks"),
                        }
                    }
                }
            }
        })
    }

    async fn consume_batch(&self) -> PipelineResult<()> {
        let available = self.semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let tasks = self
            .queue
            .consume(&self.consumer_name, self.config.block_ms, available.min(5))
            .await?;
        if tasks.is_empty() {
            return Ok(());
        }
        debug!(count = tasks.len(), "Consumed tasks");

        for (message_id, payload) in tasks {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::dispatch_failure("relay semaphore closed"))?;
            let queue = Arc::clone(&self.queue);
            let webhook = self.webhook.clone();

            tokio::spawn(async move {
                let _permit = permit;
                relay_one(&queue, &webhook, &message_id, &payload).await;
            });
        }
        Ok(())
    }

    async fn wait_for_deliveries(&self) {
        while self.semaphore.available_permits() < self.config.max_concurrent_tasks {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Deliver one message and settle it on the stream.
async fn relay_one(queue: &TaskQueue, webhook: &WebhookClient, message_id: &str, payload: &TaskPayload) {
    let task_id = payload.id.as_str();

    match webhook.deliver(payload).await {
        Ok(()) => {
            record_relay_delivery("delivered");
            info!(task_id = %task_id, message_id = %message_id, "Task delivered");
            if let Err(e) = queue.ack(message_id).await {
                error!(task_id = %task_id, error = %e, "Failed to ack task");
            }
            if let Err(e) = queue.clear_dedup(payload).await {
                warn!(task_id = %task_id, error = %e, "Failed to clear dedup key");
            }
        }
        Err(DeliveryError::Permanent(reason)) => {
            record_relay_delivery("rejected");
            warn!(task_id = %task_id, reason = %reason, "Task rejected, moving to DLQ");
            if let Err(e) = queue.dlq(message_id, payload, &reason).await {
                error!(task_id = %task_id, error = %e, "Failed to move task to DLQ");
            }
        }
        Err(DeliveryError::Transient(reason)) => {
            let attempts = queue.increment_retry(message_id).await.unwrap_or(u32::MAX);
            let max_retries = queue.max_retries();

            if attempts >= max_retries {
                record_relay_delivery("dead_lettered");
                warn!(
                    task_id = %task_id,
                    attempts = attempts,
                    reason = %reason,
                    "Task exceeded max retries, moving to DLQ"
                );
                if let Err(e) = queue.dlq(message_id, payload, &reason).await {
                    error!(task_id = %task_id, error = %e, "Failed to move task to DLQ");
                }
            } else {
                record_relay_delivery("retry");
                info!(
                    task_id = %task_id,
                    attempt = attempts,
                    max_retries = max_retries,
                    reason = %reason,
                    "Task will be redelivered"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlog_models::{VlogRequest, VlogTask};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> TaskPayload {
        TaskPayload::generate_vlog(
            "vlog-1",
            1,
            VlogTask {
                owner_id: "u1".into(),
                request: VlogRequest::default(),
            },
        )
    }

    #[tokio::test]
    async fn test_deliver_posts_payload_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/tasks/create-vlog"))
            .and(header("X-Task-Type", "ProcessVLogTask"))
            .and(body_partial_json(serde_json::json!({
                "id": "vlog-1",
                "version": 1,
                "type": "ProcessVLogTask"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        client.deliver(&payload()).await.unwrap();
    }

    #[tokio::test]
    async fn test_client_errors_are_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid input"))
            .mount(&server)
            .await;

        let client = WebhookClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        match client.deliver(&payload()).await {
            Err(DeliveryError::Permanent(msg)) => assert!(msg.contains("invalid input")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_errors_and_throttling_are_transient() {
        for status in [429u16, 500, 503] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let client = WebhookClient::new(server.uri(), Duration::from_secs(5)).unwrap();
            assert!(matches!(
                client.deliver(&payload()).await,
                Err(DeliveryError::Transient(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_transient() {
        let client = WebhookClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            client.deliver(&payload()).await,
            Err(DeliveryError::Transient(_))
        ));
    }

    #[test]
    fn test_reclaim_waits_out_webhook_timeout() {
        let webhook = Duration::from_secs(900);
        assert_eq!(reclaim_idle(Duration::from_secs(600), webhook), Duration::from_secs(960));
        assert_eq!(reclaim_idle(Duration::from_secs(3600), webhook), Duration::from_secs(3600));

        let defaults = reclaim_idle(
            vlog_queue::QueueConfig::default().visibility_timeout,
            RelayConfig::default().webhook_timeout,
        );
        assert!(defaults > RelayConfig::default().webhook_timeout);
        assert_eq!(defaults, vlog_queue::QueueConfig::default().visibility_timeout);
    }

    #[test]
    fn test_url_for_trims_slash() {
        let client = WebhookClient::new("http://api:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url_for(&payload()), "http://api:8080/internal/tasks/create-vlog");
    }
}
