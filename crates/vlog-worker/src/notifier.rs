//! Owner notifications for terminal job transitions.

use tracing::{debug, warn};

use vlog_models::{Entity, Notification};
use vlog_store::Repository;

/// Writes notifications; failures are logged and swallowed.
#[derive(Clone)]
pub struct Notifier {
    repo: Repository<Notification>,
}

impl Notifier {
    pub fn new(repo: Repository<Notification>) -> Self {
        Self { repo }
    }

    /// Persist `notification` for its owner. Returns whether it was stored.
    pub async fn send(&self, notification: Notification) -> bool {
        let owner = notification.owner_id().to_string();
        let kind = notification.kind.as_str();

        match self.repo.create(&owner, notification).await {
            Ok(stored) => {
                debug!(
                    notification_id = %stored.id(),
                    owner_id = %owner,
                    kind = kind,
                    "Notification sent"
                );
                true
            }
            Err(e) => {
                warn!(
                    owner_id = %owner,
                    kind = kind,
                    error = %e,
                    "Failed to send notification"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vlog_models::NotificationKind;
    use vlog_store::MemoryBackend;

    #[tokio::test]
    async fn test_send_persists_for_owner() {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Notifier::new(Repository::new(backend.clone()));

        assert!(notifier.send(Notification::vlog_completed("u1", "v1", "Kyoto")).await);
        assert_eq!(backend.len(Notification::COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn test_invalid_notification_is_swallowed() {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Notifier::new(Repository::new(backend.clone()));

        let mut n = Notification::media_failed("u1", "m1", "boom");
        n.message.clear();
        assert_eq!(n.kind, NotificationKind::MediaFailed);

        assert!(!notifier.send(n).await);
        assert!(backend.is_empty(Notification::COLLECTION).await);
    }
}
