//! Code slot state machine.
//!
//! A [`Slot`] owns everything known about one code position on one lock: its
//! policy, usage count, desired and observed codes, sync error count and a
//! short transition history.
//!
//! # States
//!
//! - `Disabled`: no code should be on the lock (initial state)
//! - `Enabled`: the desired code should be on the lock
//! - `Dirty`: the lock disagrees with the slot, a corrective write follows
//! - `Unknown`: an invalid target state was requested
//!
//! # Writes
//!
//! Entering `Enabled` yields a write of the desired code, entering `Disabled`
//! yields a clear. Re-entering the current state yields nothing, so callers
//! can re-assert a state as often as they like. Writes are returned as
//! [`WriteCommand`] values; the slot never talks to a lock itself.
//!
//! ```
//! use chrono::NaiveDate;
//! use keyslot_core::{AccessCode, LockId, PolicySettings, SlotState};
//! use keyslot_engine::Slot;
//!
//! let now = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(12, 0, 0).unwrap();
//! let mut slot = Slot::new(LockId::new("lock.front").unwrap(), 1);
//!
//! slot.set_code(AccessCode::new(1234).unwrap(), now);
//! let write = slot.set_policy(PolicySettings::new(true), now).unwrap();
//! assert_eq!(write.code, Some(AccessCode::new(1234).unwrap()));
//! assert_eq!(slot.state(), SlotState::Enabled);
//!
//! // Asserting the same state again is a no-op.
//! assert!(slot.apply_state(SlotState::Enabled, now).is_none());
//! ```

use chrono::NaiveDateTime;
use keyslot_core::{
    AccessCode, Evaluation, LockId, PolicySettings, SlotRecord, SlotState, StatusReason, evaluate,
};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, error};

/// Transitions kept per slot for diagnostics.
const MAX_HISTORY_SIZE: usize = 32;

/// Code to program into (or clear from) one slot of a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    pub lock_id: LockId,
    pub slot_index: u16,
    /// `None` clears the slot.
    pub code: Option<AccessCode>,
}

/// A single slot state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: SlotState,
    pub to: SlotState,
    pub at: NaiveDateTime,
}

/// Point-in-time view of a slot, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSnapshot {
    pub lock_id: LockId,
    pub slot_index: u16,
    pub name: String,
    pub state: SlotState,
    pub previous_state: SlotState,
    pub reason: StatusReason,
    pub status: &'static str,
    pub user_name: String,
    pub notify_on_use: bool,
    pub desired_code: Option<AccessCode>,
    pub observed_code: Option<AccessCode>,
    pub observed_at: Option<NaiveDateTime>,
    pub usage_count: u32,
    pub sync_errors: u32,
    pub suspended: bool,
}

#[derive(Debug, Clone)]
pub struct Slot {
    lock_id: LockId,
    index: u16,
    state: SlotState,
    previous_state: SlotState,
    reason: StatusReason,
    desired_code: Option<AccessCode>,
    observed_code: Option<AccessCode>,
    observed_at: Option<NaiveDateTime>,
    settings: Option<PolicySettings>,
    usage_count: u32,
    sync_errors: u32,
    escalated: bool,
    unsaved: bool,
    history: VecDeque<StateTransition>,
}

impl Slot {
    /// Create an unconfigured, disabled slot.
    pub fn new(lock_id: LockId, index: u16) -> Self {
        Self::from_record(SlotRecord::new(lock_id, index))
    }

    /// Rebuild a slot from its persisted record.
    ///
    /// The record's state is taken as-is; call [`reconcile`](Self::reconcile)
    /// to re-evaluate it against the current time.
    pub fn from_record(record: SlotRecord) -> Self {
        Self {
            lock_id: record.lock_id,
            index: record.slot_index,
            state: record.state,
            previous_state: record.state,
            reason: StatusReason::Unknown,
            desired_code: record.desired_code,
            observed_code: None,
            observed_at: None,
            settings: record.settings,
            usage_count: record.usage_count,
            sync_errors: 0,
            escalated: false,
            unsaved: false,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn to_record(&self) -> SlotRecord {
        SlotRecord {
            lock_id: self.lock_id.clone(),
            slot_index: self.index,
            state: self.state,
            desired_code: self.desired_code,
            usage_count: self.usage_count,
            settings: self.settings.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn lock_id(&self) -> &LockId {
        &self.lock_id
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn previous_state(&self) -> SlotState {
        self.previous_state
    }

    /// Reason given by the last evaluation.
    pub fn reason(&self) -> StatusReason {
        self.reason
    }

    pub fn desired_code(&self) -> Option<AccessCode> {
        self.desired_code
    }

    /// Last code read back from the lock; `None` if cleared or never polled.
    pub fn observed_code(&self) -> Option<AccessCode> {
        self.observed_code
    }

    pub fn observed_at(&self) -> Option<NaiveDateTime> {
        self.observed_at
    }

    pub fn settings(&self) -> Option<&PolicySettings> {
        self.settings.as_ref()
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn sync_errors(&self) -> u32 {
        self.sync_errors
    }

    /// Whether the out-of-sync escalation was already raised for the
    /// current episode.
    pub fn escalated(&self) -> bool {
        self.escalated
    }

    /// User name from the settings, empty when there are none.
    pub fn user_name(&self) -> &str {
        self.settings.as_ref().map_or("", |s| s.user_name())
    }

    /// Whether uses of this slot should be announced.
    pub fn should_alert(&self) -> bool {
        self.settings.as_ref().is_some_and(|s| s.notify_on_use())
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Status view; `ceiling` decides whether the slot counts as suspended.
    pub fn snapshot(&self, name: String, ceiling: u32) -> SlotSnapshot {
        SlotSnapshot {
            lock_id: self.lock_id.clone(),
            slot_index: self.index,
            name,
            state: self.state,
            previous_state: self.previous_state,
            reason: self.reason,
            status: self.reason.description(),
            user_name: self.user_name().to_string(),
            notify_on_use: self.should_alert(),
            desired_code: self.desired_code,
            observed_code: self.observed_code,
            observed_at: self.observed_at,
            usage_count: self.usage_count,
            sync_errors: self.sync_errors,
            suspended: self.sync_errors >= ceiling,
        }
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// Run the policy evaluator and remember its reason.
    pub fn evaluate(&mut self, now: NaiveDateTime) -> Evaluation {
        let evaluation = evaluate(self.settings.as_ref(), self.usage_count, now);
        self.reason = evaluation.reason;
        evaluation
    }

    /// Move to the state the policy asks for at `now`.
    pub fn reconcile(&mut self, now: NaiveDateTime) -> Option<WriteCommand> {
        let verdict = self.evaluate(now).verdict;
        self.apply_state(verdict.into(), now)
    }

    /// Request a target state.
    ///
    /// `Enabled` and `Disabled` are the only valid targets. Entering one of
    /// them yields the matching write; staying in it yields nothing. Any other
    /// target forces the slot to `Unknown`.
    pub fn apply_state(&mut self, target: SlotState, now: NaiveDateTime) -> Option<WriteCommand> {
        match target {
            SlotState::Enabled | SlotState::Disabled => {
                if self.state == target {
                    return None;
                }

                self.transition(target, now);
                let code = match target {
                    SlotState::Enabled => self.desired_code,
                    _ => None,
                };
                Some(WriteCommand {
                    lock_id: self.lock_id.clone(),
                    slot_index: self.index,
                    code,
                })
            }
            SlotState::Dirty | SlotState::Unknown => {
                error!(
                    lock_id = %self.lock_id,
                    slot = self.index,
                    requested = %target,
                    "Invalid target state requested, marking slot unknown"
                );
                if self.state != SlotState::Unknown {
                    self.transition(SlotState::Unknown, now);
                }
                None
            }
        }
    }

    /// Flag disagreement with the lock.
    pub fn mark_dirty(&mut self, now: NaiveDateTime) {
        if self.state != SlotState::Dirty {
            self.transition(SlotState::Dirty, now);
        }
    }

    fn transition(&mut self, to: SlotState, at: NaiveDateTime) {
        let from = self.state;
        debug!(lock_id = %self.lock_id, slot = self.index, %from, %to, "Slot transition");

        self.previous_state = from;
        self.state = to;
        self.unsaved = true;

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(StateTransition { from, to, at });
    }

    // ------------------------------------------------------------------
    // Drift bookkeeping
    // ------------------------------------------------------------------

    pub(crate) fn record_observation(&mut self, code: Option<AccessCode>, at: NaiveDateTime) {
        self.observed_code = code;
        self.observed_at = Some(at);
    }

    pub(crate) fn increment_sync_errors(&mut self) -> u32 {
        self.sync_errors = self.sync_errors.saturating_add(1);
        self.sync_errors
    }

    pub(crate) fn clear_sync_errors(&mut self) {
        self.sync_errors = 0;
        self.escalated = false;
    }

    /// Mark the episode as escalated. Returns `false` if it already was.
    pub(crate) fn mark_escalated(&mut self) -> bool {
        !std::mem::replace(&mut self.escalated, true)
    }

    // ------------------------------------------------------------------
    // Management operations
    // ------------------------------------------------------------------

    /// Replace the slot's policy.
    pub fn set_policy(&mut self, settings: PolicySettings, now: NaiveDateTime) -> Option<WriteCommand> {
        self.settings = Some(settings);
        self.unsaved = true;
        self.reconcile(now)
    }

    /// Turn the policy's enable flag on. Does nothing without settings.
    pub fn enable(&mut self, now: NaiveDateTime) -> Option<WriteCommand> {
        self.set_enabled(true, now)
    }

    /// Turn the policy's enable flag off. Does nothing without settings.
    pub fn disable(&mut self, now: NaiveDateTime) -> Option<WriteCommand> {
        self.set_enabled(false, now)
    }

    fn set_enabled(&mut self, enabled: bool, now: NaiveDateTime) -> Option<WriteCommand> {
        if let Some(settings) = self.settings.take() {
            self.settings = Some(settings.with_enabled(enabled));
            self.unsaved = true;
        }
        self.reconcile(now)
    }

    /// Change the desired code.
    ///
    /// An enabled slot is marked dirty first so the new code is written when
    /// it re-enters `Enabled`.
    pub fn set_code(&mut self, code: AccessCode, now: NaiveDateTime) -> Option<WriteCommand> {
        if self.desired_code != Some(code) {
            self.desired_code = Some(code);
            self.unsaved = true;
            if self.state == SlotState::Enabled {
                self.mark_dirty(now);
            }
        }
        self.reconcile(now)
    }

    /// Forget the slot's policy, code and usage and re-arm the circuit
    /// breaker.
    pub fn reset(&mut self, now: NaiveDateTime) -> Option<WriteCommand> {
        self.settings = None;
        self.desired_code = None;
        self.usage_count = 0;
        self.clear_sync_errors();
        self.unsaved = true;
        self.reconcile(now)
    }

    pub fn reset_usage_count(&mut self, now: NaiveDateTime) -> Option<WriteCommand> {
        if self.usage_count != 0 {
            self.usage_count = 0;
            self.unsaved = true;
        }
        self.reconcile(now)
    }

    /// Count one use of the slot's code.
    pub fn record_use(&mut self, now: NaiveDateTime) -> Option<WriteCommand> {
        self.usage_count = self.usage_count.saturating_add(1);
        self.unsaved = true;
        self.reconcile(now)
    }

    /// Take the "changed since last save" flag.
    pub(crate) fn take_unsaved(&mut self) -> bool {
        std::mem::replace(&mut self.unsaved, false)
    }

    pub(crate) fn mark_unsaved(&mut self) {
        self.unsaved = true;
    }
}
