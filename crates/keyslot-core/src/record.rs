use crate::policy::PolicySettings;
use crate::types::{AccessCode, LockId, SlotState};
use serde::{Deserialize, Serialize};

/// Durable part of a code slot.
///
/// This is what survives a restart. Runtime-only data (observed code, sync
/// error count, transition history) is rebuilt by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub lock_id: LockId,
    pub slot_index: u16,
    pub state: SlotState,
    #[serde(default)]
    pub desired_code: Option<AccessCode>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub settings: Option<PolicySettings>,
}

impl SlotRecord {
    /// A fresh, unconfigured slot.
    pub fn new(lock_id: LockId, slot_index: u16) -> Self {
        Self {
            lock_id,
            slot_index,
            state: SlotState::Disabled,
            desired_code: None,
            usage_count: 0,
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: PolicySettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_desired_code(mut self, code: AccessCode) -> Self {
        self.desired_code = Some(code);
        self
    }

    pub fn with_usage_count(mut self, usage_count: u32) -> Self {
        self.usage_count = usage_count;
        self
    }

    pub fn with_state(mut self, state: SlotState) -> Self {
        self.state = state;
        self
    }
}
