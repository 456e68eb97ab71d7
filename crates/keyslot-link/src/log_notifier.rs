use crate::error::NotifyError;
use crate::traits::Notifier;
use crate::types::Notification;
use tracing::{info, warn};

/// Notifier that writes notifications to the log.
///
/// Used by the `keyslot` binary when no messaging service is configured.
/// Persistent notifications are logged at `warn` level.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    default_target: Option<String>,
}

impl LogNotifier {
    pub fn new(default_target: Option<String>) -> Self {
        Self { default_target }
    }
}

impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let target = notification
            .target
            .as_deref()
            .or(self.default_target.as_deref())
            .unwrap_or("default");

        if notification.persistent {
            warn!(
                id = %notification.id,
                lock_id = %notification.lock_id,
                target,
                "{}",
                notification.message
            );
        } else {
            info!(
                lock_id = %notification.lock_id,
                target,
                "{}",
                notification.message
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyslot_core::LockId;

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let notifier = LogNotifier::new(Some("mobile_app".to_string()));
        let lock = LockId::new("lock.front").unwrap();

        let plain = Notification::new(lock.clone(), "Front has been opened.");
        let persistent = Notification::new(lock, "Slot and Lock are out of sync.")
            .with_target(Some("pager".to_string()))
            .persistent();

        assert!(notifier.notify(plain).await.is_ok());
        assert!(notifier.notify(persistent).await.is_ok());
    }
}
