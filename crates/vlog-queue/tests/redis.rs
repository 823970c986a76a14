//! Redis Streams integration tests. Run with `REDIS_URL` pointing at a
//! disposable instance.

use vlog_models::{new_record_id, MediaAnalysisTask, TaskPayload};
use vlog_queue::{QueueConfig, QueueError, TaskQueue, TaskSink};

fn queue() -> TaskQueue {
    let suffix = new_record_id();
    let config = QueueConfig {
        stream_name: format!("vlog:test:{}", suffix),
        consumer_group: format!("vlog:test-group:{}", suffix),
        dlq_stream_name: format!("vlog:test-dlq:{}", suffix),
        ..QueueConfig::from_env()
    };
    TaskQueue::new(config).unwrap()
}

fn payload() -> TaskPayload {
    TaskPayload::analyze_media(
        new_record_id(),
        1,
        MediaAnalysisTask {
            owner_id: "integration".to_string(),
            media_ids: vec!["m1".to_string()],
        },
    )
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_enqueue_consume_ack() {
    let queue = queue();
    queue.init().await.unwrap();
    queue.ping().await.unwrap();

    let task = payload();
    queue.enqueue(&task).await.unwrap();
    assert_eq!(queue.len().await.unwrap(), 1);

    let delivered = queue.consume("relay-test", 100, 10).await.unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1, task);

    queue.ack(&delivered[0].0).await.unwrap();
    assert_eq!(queue.len().await.unwrap(), 0);
    queue.clear_dedup(&task).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_duplicate_enqueue_is_rejected_until_cleared() {
    let queue = queue();
    queue.init().await.unwrap();

    let task = payload();
    queue.enqueue(&task).await.unwrap();
    let err = queue.enqueue(&task).await.unwrap_err();
    assert!(matches!(err, QueueError::Duplicate(_)));

    queue.clear_dedup(&task).await.unwrap();
    queue.enqueue(&task).await.unwrap();
    assert_eq!(queue.len().await.unwrap(), 2);
    queue.clear_dedup(&task).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dead_letter_moves_task() {
    let queue = queue();
    queue.init().await.unwrap();

    let task = payload();
    queue.enqueue(&task).await.unwrap();
    let delivered = queue.consume("relay-test", 100, 10).await.unwrap();

    assert_eq!(queue.increment_retry(&delivered[0].0).await.unwrap(), 1);
    queue.dlq(&delivered[0].0, &task, "webhook returned 400").await.unwrap();

    assert_eq!(queue.len().await.unwrap(), 0);
    assert_eq!(queue.dlq_len().await.unwrap(), 1);
}
