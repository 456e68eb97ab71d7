use crate::constants::DEFAULT_OPEN_DURATION_SECS;
use crate::error::{Error, Result};
use crate::types::{LockId, SlotRange};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of one managed lock.
///
/// # Example
///
/// ```
/// use keyslot_core::{LockConfig, LockId, SlotRange};
///
/// let config = LockConfig::new(LockId::new("lock.front_door").unwrap())
///     .name("Front Door")
///     .slots(SlotRange::new(1, 6).unwrap())
///     .notify_door_opened(true);
///
/// assert_eq!(config.safe_name(), "front_door");
/// assert_eq!(config.slot_name(3), "front_door_code_slot_3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Identifier the lock link knows the lock by
    pub lock_id: LockId,

    /// Display name used in notifications; falls back to the lock id
    #[serde(default)]
    pub name: String,

    /// Lock manufacturer, selects the alarm table
    #[serde(default)]
    pub manufacturer: Option<String>,

    /// Managed slot indexes
    #[serde(default)]
    pub slots: SlotRange,

    /// Notification channel; `None` uses the notifier's default
    #[serde(default)]
    pub notify_target: Option<String>,

    /// Notify when the door opens or a lock state change goes unconfirmed
    #[serde(default)]
    pub notify_door_opened: bool,

    /// Keep reminding while the door stays open
    #[serde(default)]
    pub notify_left_open: bool,

    /// Notify on general lock status changes
    #[serde(default)]
    pub notify_lock_general: bool,

    /// Period of the "left open" reminder, in seconds
    #[serde(default = "default_open_duration_secs")]
    pub open_duration_secs: u64,
}

fn default_open_duration_secs() -> u64 {
    DEFAULT_OPEN_DURATION_SECS
}

impl LockConfig {
    pub fn new(lock_id: LockId) -> Self {
        Self {
            lock_id,
            name: String::new(),
            manufacturer: None,
            slots: SlotRange::default(),
            notify_target: None,
            notify_door_opened: false,
            notify_left_open: false,
            notify_lock_general: false,
            open_duration_secs: DEFAULT_OPEN_DURATION_SECS,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn slots(mut self, slots: SlotRange) -> Self {
        self.slots = slots;
        self
    }

    pub fn notify_target(mut self, target: impl Into<String>) -> Self {
        self.notify_target = Some(target.into());
        self
    }

    pub fn notify_door_opened(mut self, notify: bool) -> Self {
        self.notify_door_opened = notify;
        self
    }

    pub fn notify_left_open(mut self, notify: bool) -> Self {
        self.notify_left_open = notify;
        self
    }

    pub fn notify_lock_general(mut self, notify: bool) -> Self {
        self.notify_lock_general = notify;
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration_secs = duration.as_secs();
        self
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.lock_id.as_str()
        } else {
            &self.name
        }
    }

    /// Lowercase display name with spaces replaced by underscores.
    #[must_use]
    pub fn safe_name(&self) -> String {
        self.display_name().to_lowercase().replace(' ', "_")
    }

    /// Name of the status entry for one slot, e.g. `front_door_code_slot_3`.
    #[must_use]
    pub fn slot_name(&self, slot_index: u16) -> String {
        format!("{}_code_slot_{}", self.safe_name(), slot_index)
    }

    #[must_use]
    pub fn open_duration_value(&self) -> Duration {
        Duration::from_secs(self.open_duration_secs)
    }

    /// Re-check invariants that deserialization cannot enforce.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlotRange` for an empty or overflowing slot
    /// range and `Error::Config` for a zero reminder period.
    pub fn validate(&self) -> Result<()> {
        SlotRange::new(self.slots.start(), self.slots.count())?;

        if self.notify_left_open && self.open_duration_secs == 0 {
            return Err(Error::Config(format!(
                "{}: open_duration_secs must be positive when notify_left_open is set",
                self.lock_id
            )));
        }

        Ok(())
    }
}
