//! Drift detection between slots and what the lock reports.
//!
//! The detector runs once per slot per poll. It compares the code the lock
//! reported with what the slot's settled state implies, re-asserts the state
//! on disagreement and counts consecutive disagreements. When the count
//! reaches the ceiling the slot is suspended: no further corrective writes
//! are issued until the slot is reset, and exactly one escalation is raised.
//!
//! Writes are not awaited here. The next poll re-observes the lock, which is
//! what eventually settles the slot.

use crate::slot::{Slot, WriteCommand};
use chrono::NaiveDateTime;
use keyslot_core::constants::SYNC_ERROR_CEILING;
use keyslot_core::{AccessCode, SlotState};
use tracing::{debug, warn};

/// What a single observation did to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftOutcome {
    /// The lock agrees with the slot.
    InSync,

    /// The slot has no settings; nothing to reconcile.
    Unmanaged,

    /// The circuit breaker is open for this slot.
    Suspended,

    /// The slot was dirty and its state was re-asserted.
    Corrected {
        write: Option<WriteCommand>,
        sync_errors: u32,
        /// Set on the correction that reached the ceiling.
        escalate: bool,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct DriftDetector {
    ceiling: u32,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(SYNC_ERROR_CEILING)
    }
}

impl DriftDetector {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling: ceiling.max(1),
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Feed the raw text the lock reported for `slot`.
    ///
    /// The slot is expected to be settled (`Enabled` or `Disabled`) by a
    /// preceding [`Slot::reconcile`].
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use keyslot_core::{AccessCode, LockId, PolicySettings};
    /// use keyslot_engine::{DriftDetector, DriftOutcome, Slot};
    ///
    /// let now = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(12, 0, 0).unwrap();
    /// let mut slot = Slot::new(LockId::new("lock.front").unwrap(), 1);
    /// slot.set_code(AccessCode::new(1234).unwrap(), now);
    /// slot.set_policy(PolicySettings::new(true), now);
    ///
    /// let detector = DriftDetector::default();
    /// assert!(matches!(detector.on_observed(&mut slot, "0000", now), DriftOutcome::Corrected { sync_errors: 1, .. }));
    /// assert_eq!(detector.on_observed(&mut slot, "1234", now), DriftOutcome::InSync);
    /// assert_eq!(slot.sync_errors(), 0);
    /// ```
    pub fn on_observed(&self, slot: &mut Slot, raw: &str, now: NaiveDateTime) -> DriftOutcome {
        let observed = AccessCode::parse_observed(raw);
        slot.record_observation(observed, now);

        if slot.sync_errors() >= self.ceiling {
            debug!(
                lock_id = %slot.lock_id(),
                slot = slot.index(),
                "Slot suspended, skipping reconciliation"
            );
            return DriftOutcome::Suspended;
        }

        if slot.settings().is_none() {
            return DriftOutcome::Unmanaged;
        }

        let expected = slot.state();
        let drifted = match expected {
            SlotState::Enabled => observed != slot.desired_code(),
            SlotState::Disabled => observed.is_some(),
            SlotState::Dirty | SlotState::Unknown => false,
        };

        if !drifted {
            if slot.sync_errors() > 0 {
                debug!(lock_id = %slot.lock_id(), slot = slot.index(), "Slot back in sync");
            }
            slot.clear_sync_errors();
            return DriftOutcome::InSync;
        }

        slot.mark_dirty(now);
        let write = slot.apply_state(expected, now);
        let sync_errors = slot.increment_sync_errors();
        let escalate = sync_errors >= self.ceiling && slot.mark_escalated();

        warn!(
            lock_id = %slot.lock_id(),
            slot = slot.index(),
            state = %expected,
            sync_errors,
            "Slot out of sync with lock, re-asserting"
        );

        DriftOutcome::Corrected {
            write,
            sync_errors,
            escalate,
        }
    }
}
