//! Values exchanged with lock backends and notification channels.

use chrono::{DateTime, Utc};
use keyslot_core::LockId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw code value a lock reported for one slot.
///
/// `raw` is passed through untouched; locks pad with NUL bytes, report
/// cleared slots as zeros and sometimes mask codes, so interpretation is left
/// to [`AccessCode::parse_observed`](keyslot_core::AccessCode::parse_observed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedCode {
    pub slot_index: u16,
    pub raw: String,
}

impl ObservedCode {
    pub fn new(slot_index: u16, raw: impl Into<String>) -> Self {
        Self {
            slot_index,
            raw: raw.into(),
        }
    }
}

/// Human-readable alert about a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id, usable to dismiss a persistent notification.
    pub id: Uuid,

    pub lock_id: LockId,

    /// Delivery target; `None` leaves the choice to the channel.
    pub target: Option<String>,

    pub message: String,

    /// Persistent notifications stay visible until dismissed.
    pub persistent: bool,

    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(lock_id: LockId, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lock_id,
            target: None,
            message: message.into(),
            persistent: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_builder() {
        let lock = LockId::new("lock.front").unwrap();
        let a = Notification::new(lock.clone(), "Front has been opened.")
            .with_target(Some("phone".to_string()));
        let b = Notification::new(lock, "Front has been opened.").persistent();

        assert_ne!(a.id, b.id);
        assert_eq!(a.target.as_deref(), Some("phone"));
        assert!(!a.persistent);
        assert!(b.persistent);
    }

    #[test]
    fn test_notification_serializes_lock_id_as_string() {
        let n = Notification::new(LockId::new("lock.front").unwrap(), "hello");
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["lock_id"], "lock.front");
        assert_eq!(value["message"], "hello");
    }
}
