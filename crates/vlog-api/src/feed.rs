//! Server-sent event rendering of status feeds.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;

use vlog_models::FeedEvent;

/// Name of the event that ends a feed.
pub const COMPLETE_EVENT: &str = "complete";

/// Payload of the closing event.
pub const COMPLETE_DATA: &str = r#"{"status":"done"}"#;

/// Render one feed event. Snapshots are unnamed `data:` events.
pub fn to_event<T: Serialize>(event: FeedEvent<T>) -> Result<Event, axum::Error> {
    match event {
        FeedEvent::Snapshot(snapshot) => Event::default().json_data(&snapshot),
        FeedEvent::Complete => Ok(Event::default().event(COMPLETE_EVENT).data(COMPLETE_DATA)),
    }
}

/// Stream a feed to the client until it completes.
pub fn sse_feed<T, S>(feed: S) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static>
where
    T: Serialize + Send + 'static,
    S: Stream<Item = FeedEvent<T>> + Send + 'static,
{
    Sse::new(feed.map(to_event)).keep_alive(KeepAlive::default())
}
