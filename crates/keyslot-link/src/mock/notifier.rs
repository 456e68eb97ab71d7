//! Notifier that keeps every notification in memory.

use crate::error::NotifyError;
use crate::traits::Notifier;
use crate::types::Notification;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inbox {
    sent: Vec<Notification>,
    failing: bool,
    attempts: u32,
}

/// Records notifications instead of delivering them. Clones share the same
/// inbox, so a clone kept by a test sees what the engine sent.
///
/// ```
/// use keyslot_core::LockId;
/// use keyslot_link::mock::RecordingNotifier;
/// use keyslot_link::traits::Notifier;
/// use keyslot_link::Notification;
///
/// #[tokio::main]
/// async fn main() {
///     let notifier = RecordingNotifier::new();
///     let lock = LockId::new("lock.front").unwrap();
///     notifier.notify(Notification::new(lock, "Front has been opened.")).await.unwrap();
///     assert_eq!(notifier.messages(), vec!["Front has been opened."]);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    inbox: Arc<Mutex<Inbox>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivered notifications, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.inbox().sent.clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.inbox().sent.iter().map(|n| n.message.clone()).collect()
    }

    /// Delivered notifications whose message contains `needle`.
    #[must_use]
    pub fn count_containing(&self, needle: &str) -> usize {
        self.inbox()
            .sent
            .iter()
            .filter(|n| n.message.contains(needle))
            .count()
    }

    /// Number of `notify` calls, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inbox().attempts
    }

    /// Reject every notification until turned off again.
    pub fn set_failing(&self, failing: bool) {
        self.inbox().failing = failing;
    }

    pub fn clear(&self) {
        self.inbox().sent.clear();
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let mut inbox = self.inbox();
        inbox.attempts += 1;
        if inbox.failing {
            return Err(NotifyError::unavailable("recording notifier"));
        }
        inbox.sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyslot_core::LockId;

    #[tokio::test]
    async fn test_failing_notifier_records_attempt_only() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);

        let result = notifier
            .notify(Notification::new(LockId::new("lock.a").unwrap(), "x"))
            .await;

        assert!(result.is_err());
        assert_eq!(notifier.attempts(), 1);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_inbox() {
        let notifier = RecordingNotifier::new();
        let observer = notifier.clone();

        notifier
            .notify(Notification::new(LockId::new("lock.a").unwrap(), "Door has been left open."))
            .await
            .unwrap();

        assert_eq!(observer.count_containing("left open"), 1);
        observer.clear();
        assert!(notifier.sent().is_empty());
    }
}
