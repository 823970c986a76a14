//! Polling status feed over tracked jobs.
//!
//! The feed emits a snapshot right away and then once per interval. When
//! every tracked id is terminal it emits the final snapshot, one
//! [`FeedEvent::Complete`], and ends. Ids that fail to load are left out of
//! that tick's snapshot.

use std::time::Duration;

use futures_util::stream::{self, Stream};
use tracing::debug;

use vlog_models::{FeedEvent, StatusSnapshot, TrackedJob};
use vlog_store::Repository;

enum Phase {
    First,
    Polling,
    Complete,
    Done,
}

struct FeedState<T> {
    repo: Repository<T>,
    ids: Vec<String>,
    interval: Duration,
    phase: Phase,
}

/// Watch `ids` until all are terminal.
pub fn watch_jobs<T: TrackedJob>(
    repo: Repository<T>,
    ids: Vec<String>,
    interval: Duration,
) -> impl Stream<Item = FeedEvent<T>> + Send {
    let state = FeedState {
        repo,
        ids,
        interval,
        phase: Phase::First,
    };

    stream::unfold(state, |mut state| async move {
        match state.phase {
            Phase::Done => return None,
            Phase::Complete => {
                state.phase = Phase::Done;
                return Some((FeedEvent::Complete, state));
            }
            Phase::First => state.phase = Phase::Polling,
            Phase::Polling => tokio::time::sleep(state.interval).await,
        }

        let snapshot = load_snapshot(&state.repo, &state.ids).await;
        if snapshot.all_completed {
            state.phase = Phase::Complete;
        }
        Some((FeedEvent::Snapshot(snapshot), state))
    })
}

/// Watch a single job; each snapshot carries at most one item.
pub fn watch_job<T: TrackedJob>(
    repo: Repository<T>,
    id: impl Into<String>,
    interval: Duration,
) -> impl Stream<Item = FeedEvent<T>> + Send {
    watch_jobs(repo, vec![id.into()], interval)
}

async fn load_snapshot<T: TrackedJob>(repo: &Repository<T>, ids: &[String]) -> StatusSnapshot<T> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        match repo.find(id).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => debug!(collection = T::COLLECTION, id = %id, "Tracked record missing"),
            Err(e) => debug!(collection = T::COLLECTION, id = %id, error = %e, "Tracked record lookup failed"),
        }
    }
    StatusSnapshot::from_items(items, ids.len())
}
