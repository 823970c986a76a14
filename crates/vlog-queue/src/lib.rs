//! Redis Streams task queue.
//!
//! This crate provides:
//! - Task enqueueing with idempotency keys
//! - Consumer-group reads for the webhook relay
//! - Retry counters, pending-task reclaim and a dead-letter stream

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{dedup_key, QueueConfig, TaskQueue, TaskSink};
