//! Task queue using Redis Streams.
//!
//! Producers `XADD` a serialized [`TaskPayload`]; the relay reads through a
//! consumer group, acknowledges on success and moves exhausted tasks to a
//! dead-letter stream.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vlog_models::TaskPayload;

use crate::error::{QueueError, QueueResult};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub consumer_group: String,
    pub dlq_stream_name: String,
    /// Max delivery attempts before DLQ
    pub max_retries: u32,
    /// Idle time after which a pending task may be reclaimed
    pub visibility_timeout: Duration,
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vlog:tasks".to_string(),
            consumer_group: "vlog:relays".to_string(),
            dlq_stream_name: "vlog:dlq".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(960),
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            visibility_timeout: std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
            dedup_ttl: std::env::var("QUEUE_DEDUP_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.dedup_ttl),
        }
    }
}

/// Producer side of the queue.
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Enqueue a task, returning the stream message id.
    async fn enqueue(&self, payload: &TaskPayload) -> QueueResult<String>;
}

pub fn dedup_key(payload: &TaskPayload) -> String {
    format!("vlog:dedup:{}", payload.idempotency_key())
}

fn retry_key(message_id: &str) -> String {
    format!("vlog:retry:{}", message_id)
}

pub struct TaskQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Create the consumer group if it does not exist.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(group = %self.config.consumer_group, "Created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "Consumer group already exists");
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    /// Acknowledge and delete a delivered task.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        conn.del::<_, ()>(retry_key(message_id)).await?;
        debug!(message_id = %message_id, "Acknowledged task");
        Ok(())
    }

    /// Move a task to the dead-letter stream and release its dedup key.
    pub async fn dlq(&self, message_id: &str, payload: &TaskPayload, error: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let body = serde_json::to_string(payload)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("task")
            .arg(&body)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;
        self.clear_dedup(payload).await?;

        warn!(
            task_id = %payload.id,
            task_type = payload.kind.type_name(),
            error = %error,
            "Moved task to DLQ"
        );
        Ok(())
    }

    pub async fn clear_dedup(&self, payload: &TaskPayload) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(dedup_key(payload)).await?;
        Ok(())
    }

    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }

    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.xlen(&self.config.dlq_stream_name).await?)
    }

    /// Read new tasks for `consumer_name`, blocking up to `block_ms`.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, TaskPayload)>> {
        let mut conn = self.connection().await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                if let Some(task) = self.decode_entry(&entry.id, &entry.map).await {
                    tasks.push((entry.id, task));
                }
            }
        }
        Ok(tasks)
    }

    /// Claim tasks idle longer than `min_idle`, e.g. from a crashed relay.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        count: usize,
        min_idle: Duration,
    ) -> QueueResult<Vec<(String, TaskPayload)>> {
        let mut conn = self.connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;
        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let reply: redis::streams::StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();
        for entry in reply.claimed {
            if let Some(task) = self.decode_entry(&entry.id, &entry.map).await {
                info!(message_id = %entry.id, task_id = %task.id, "Claimed pending task");
                tasks.push((entry.id, task));
            }
        }
        Ok(tasks)
    }

    /// Decode a stream entry; malformed entries are acked and dropped.
    async fn decode_entry(
        &self,
        message_id: &str,
        fields: &std::collections::HashMap<String, redis::Value>,
    ) -> Option<TaskPayload> {
        let raw = match fields.get("task") {
            Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => {
                warn!(message_id = %message_id, "Stream entry has no task field");
                self.ack(message_id).await.ok();
                return None;
            }
        };

        match serde_json::from_str::<TaskPayload>(&raw) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "Failed to parse task payload");
                self.ack(message_id).await.ok();
                None
            }
        }
    }

    pub async fn retry_count(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;
        let count: Option<u32> = conn.get(retry_key(message_id)).await?;
        Ok(count.unwrap_or(0))
    }

    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;
        let key = retry_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[async_trait]
impl TaskSink for TaskQueue {
    async fn enqueue(&self, payload: &TaskPayload) -> QueueResult<String> {
        let mut conn = self.connection().await?;
        let body = serde_json::to_string(payload)?;
        let dedup = dedup_key(payload);

        // SET NX claims the idempotency key atomically
        let claimed: bool = redis::cmd("SET")
            .arg(&dedup)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs().max(1))
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();
        if !claimed {
            warn!(key = %payload.idempotency_key(), "Duplicate task rejected");
            return Err(QueueError::Duplicate(payload.idempotency_key()));
        }

        let message_id: String = match redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("task")
            .arg(&body)
            .arg("key")
            .arg(payload.idempotency_key())
            .query_async(&mut conn)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                conn.del::<_, ()>(&dedup).await.ok();
                return Err(QueueError::enqueue_failed(e.to_string()));
            }
        };

        info!(
            task_id = %payload.id,
            task_type = payload.kind.type_name(),
            message_id = %message_id,
            "Enqueued task"
        );
        Ok(message_id)
    }
}
