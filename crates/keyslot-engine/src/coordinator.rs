//! Per-lock reconciliation coordinator.
//!
//! A [`LockCoordinator`] owns the slots of one lock and is the only thing
//! that writes to that lock. It is driven from three directions:
//!
//! - the poll scheduler, through [`poll`](LockCoordinator::poll)
//! - management operations (`set_policy`, `enable`, `set_code`, ...)
//! - lock, door and alarm events from the host
//!
//! Slot state is computed under the slot table lock; writes and
//! notifications are issued after it is released and awaited one by one, so a
//! failure on one slot never stops the others.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyslot_core::{AccessCode, LockConfig, LockId, PolicySettings, SystemClock};
//! use keyslot_engine::{EngineConfig, LockCoordinator};
//! use keyslot_link::mock::{MockLockLink, RecordingNotifier};
//!
//! # async fn example() -> keyslot_engine::Result<()> {
//! let (link, _handle) = MockLockLink::new();
//! let coordinator = LockCoordinator::new(
//!     LockConfig::new(LockId::new("lock.front")?),
//!     EngineConfig::default(),
//!     Arc::new(link),
//!     Arc::new(RecordingNotifier::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! coordinator.set_code(1, AccessCode::new(1234)?).await?;
//! coordinator.set_policy(1, PolicySettings::new(true)).await?;
//! coordinator.poll().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::drift::{DriftDetector, DriftOutcome};
use crate::error::{EngineError, Result};
use crate::slot::{Slot, SlotSnapshot, WriteCommand};
use crate::timers::{TimerKind, TimerSet};
use chrono::NaiveDateTime;
use keyslot_core::{
    AccessCode, Clock, LockConfig, LockId, PolicyDocument, PolicySettings, SlotRecord,
};
use keyslot_link::{LinkError, LockLink, LockVendor, Notification, Notifier};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Counters of one completed poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Slots the lock reported.
    pub observed: usize,
    /// Slots found out of sync and re-asserted.
    pub corrections: usize,
    /// Writes issued, policy-driven and corrective.
    pub writes: usize,
    pub write_failures: usize,
    /// Slots that reached the sync error ceiling during this poll.
    pub escalations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(PollReport),
    /// Another poll of this lock was already running.
    Coalesced,
    /// The lock link is not ready yet.
    NotReady,
    /// Polling stopped after too many consecutive failures.
    LinkDisabled,
}

/// What an alarm report was interpreted as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmOutcome {
    /// A managed code slot was used at the keypad.
    SlotUsed {
        slot_index: u16,
        status: &'static str,
    },
    /// A keypad event named a slot this lock does not manage.
    UnknownUser { alarm_level: u32 },
    /// Any other status report.
    StatusChange {
        status: &'static str,
        notified: bool,
    },
    /// The manufacturer has no alarm table.
    UnknownVendor,
}

struct PollGuard<'a>(&'a AtomicBool);

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct LockCoordinator<L: LockLink, N: Notifier> {
    config: LockConfig,
    engine: EngineConfig,
    vendor: Option<LockVendor>,
    link: Arc<L>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    drift: DriftDetector,
    slots: Mutex<BTreeMap<u16, Slot>>,
    timers: TimerSet,
    polling: AtomicBool,
    link_errors: AtomicU32,
    link_disabled: AtomicBool,
}

impl<L: LockLink, N: Notifier> LockCoordinator<L, N> {
    /// Create a coordinator with one fresh, disabled slot per index in the
    /// lock's slot range.
    pub fn new(
        config: LockConfig,
        engine: EngineConfig,
        link: Arc<L>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slots = config
            .slots
            .iter()
            .map(|index| (index, Slot::new(config.lock_id.clone(), index)))
            .collect();

        let vendor = config
            .manufacturer
            .as_deref()
            .and_then(LockVendor::from_manufacturer);

        Self {
            drift: DriftDetector::new(engine.sync_error_ceiling),
            config,
            engine,
            vendor,
            link,
            notifier,
            clock,
            slots: Mutex::new(slots),
            timers: TimerSet::new(),
            polling: AtomicBool::new(false),
            link_errors: AtomicU32::new(0),
            link_disabled: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn lock_id(&self) -> &LockId {
        &self.config.lock_id
    }

    pub fn vendor(&self) -> Option<LockVendor> {
        self.vendor
    }

    /// Consecutive failed polls so far.
    pub fn link_errors(&self) -> u32 {
        self.link_errors.load(Ordering::Acquire)
    }

    pub fn is_link_disabled(&self) -> bool {
        self.link_disabled.load(Ordering::Acquire)
    }

    pub fn is_timer_active(&self, kind: TimerKind) -> bool {
        self.timers.is_active(kind)
    }

    // ------------------------------------------------------------------
    // Restore and persistence
    // ------------------------------------------------------------------

    /// Load persisted records and re-evaluate every slot against the
    /// current time. Returns the number of records restored.
    ///
    /// Records for other locks or for indexes outside the slot range are
    /// ignored.
    pub async fn restore(&self, records: Vec<SlotRecord>) -> usize {
        let now = self.clock.now();
        let mut restored = 0;
        let mut writes = Vec::new();

        {
            let mut slots = self.slots.lock().await;
            for record in records {
                if &record.lock_id != self.lock_id() || !slots.contains_key(&record.slot_index) {
                    warn!(
                        lock_id = %self.lock_id(),
                        record_lock = %record.lock_id,
                        slot = record.slot_index,
                        "Ignoring stored record outside the managed slot range"
                    );
                    continue;
                }
                slots.insert(record.slot_index, Slot::from_record(record));
                restored += 1;
            }

            for slot in slots.values_mut() {
                writes.extend(slot.reconcile(now));
            }
        }

        info!(lock_id = %self.lock_id(), restored, pending_writes = writes.len(), "Slots restored");
        self.issue_writes(writes).await;
        restored
    }

    /// Records of every slot.
    pub async fn records(&self) -> Vec<SlotRecord> {
        self.slots.lock().await.values().map(Slot::to_record).collect()
    }

    /// Records of slots changed since the previous call.
    pub async fn take_unsaved(&self) -> Vec<SlotRecord> {
        self.slots
            .lock()
            .await
            .values_mut()
            .filter_map(|slot| slot.take_unsaved().then(|| slot.to_record()))
            .collect()
    }

    /// Flag slots as changed again, after their records failed to save.
    pub async fn mark_unsaved(&self, records: &[SlotRecord]) {
        let mut slots = self.slots.lock().await;
        for record in records {
            if let Some(slot) = slots.get_mut(&record.slot_index) {
                slot.mark_unsaved();
            }
        }
    }

    pub async fn slots(&self) -> Vec<SlotSnapshot> {
        self.slots
            .lock()
            .await
            .values()
            .map(|slot| self.snapshot_of(slot))
            .collect()
    }

    pub async fn slot(&self, slot_index: u16) -> Option<SlotSnapshot> {
        self.slots
            .lock()
            .await
            .get(&slot_index)
            .map(|slot| self.snapshot_of(slot))
    }

    fn snapshot_of(&self, slot: &Slot) -> SlotSnapshot {
        slot.snapshot(self.config.slot_name(slot.index()), self.drift.ceiling())
    }

    // ------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------

    /// Poll the lock and reconcile every slot.
    ///
    /// Returns `Coalesced` without touching the lock if a poll of this lock
    /// is already running.
    ///
    /// # Errors
    /// Returns `EngineError::Link` if the lock could not be read. Write
    /// failures are not errors; they show up in the report.
    pub async fn poll(&self) -> Result<PollOutcome> {
        if self.polling.swap(true, Ordering::AcqRel) {
            debug!(lock_id = %self.lock_id(), "Poll already in flight, coalescing");
            return Ok(PollOutcome::Coalesced);
        }
        let _guard = PollGuard(&self.polling);

        if self.is_link_disabled() {
            return Ok(PollOutcome::LinkDisabled);
        }

        if !self.link.is_ready() {
            debug!(lock_id = %self.lock_id(), "Lock link not ready, skipping poll");
            return Ok(PollOutcome::NotReady);
        }

        let observed = match self.link.poll(self.lock_id(), self.config.slots).await {
            Ok(observed) => {
                self.link_errors.store(0, Ordering::Release);
                observed
            }
            Err(e) => {
                self.on_poll_failure(&e).await;
                return Err(e.into());
            }
        };

        let now = self.clock.now();
        let raw: HashMap<u16, String> = observed
            .into_iter()
            .map(|o| (o.slot_index, o.raw))
            .collect();

        let mut report = PollReport {
            observed: raw.len(),
            ..PollReport::default()
        };
        let mut writes = Vec::new();
        let mut escalations = Vec::new();

        {
            let mut slots = self.slots.lock().await;
            for slot in slots.values_mut() {
                // A policy transition makes this poll's reading stale.
                if let Some(write) = slot.reconcile(now) {
                    writes.push(write);
                    continue;
                }

                let Some(observed) = raw.get(&slot.index()) else {
                    continue;
                };

                if let DriftOutcome::Corrected {
                    write, escalate, ..
                } = self.drift.on_observed(slot, observed, now)
                {
                    report.corrections += 1;
                    writes.extend(write);
                    if escalate {
                        escalations.push(slot.index());
                    }
                }
            }
        }

        report.writes = writes.len();
        report.write_failures = self.issue_writes(writes).await;
        report.escalations = escalations.len();

        for slot_index in escalations {
            let name = self.config.slot_name(slot_index);
            error!(
                lock_id = %self.lock_id(),
                slot = slot_index,
                ceiling = self.drift.ceiling(),
                "Slot and lock out of sync, suspending updates for this slot"
            );
            self.send(
                self.notification(format!(
                    "Slot and Lock are out of sync. {name} Check the logs. \
                     No further updates will be attempted for this slot until it is reset."
                ))
                .persistent(),
            )
            .await;
        }

        debug!(lock_id = %self.lock_id(), ?report, "Poll completed");
        Ok(PollOutcome::Completed(report))
    }

    async fn on_poll_failure(&self, e: &LinkError) {
        let errors = self.link_errors.fetch_add(1, Ordering::AcqRel) + 1;
        warn!(lock_id = %self.lock_id(), errors, error = %e, "Poll failed");

        if errors > self.engine.link_error_limit && !self.link_disabled.swap(true, Ordering::AcqRel)
        {
            error!(
                lock_id = %self.lock_id(),
                errors,
                "Too many consecutive poll failures, polling disabled until reload"
            );
            self.send(
                self.notification(format!(
                    "Data updater for {} has been disabled due to too many errors. Check the logs.",
                    self.config.display_name()
                ))
                .persistent(),
            )
            .await;
        }
    }

    /// Ask the lock to re-report its codes.
    ///
    /// # Errors
    /// Returns `EngineError::Link` if the request failed.
    pub async fn refresh_codes(&self) -> Result<()> {
        self.link.refresh_codes(self.lock_id()).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Management operations
    // ------------------------------------------------------------------

    /// # Errors
    /// Returns `EngineError::UnknownSlot` if the slot is not managed.
    pub async fn set_policy(&self, slot_index: u16, settings: PolicySettings) -> Result<SlotSnapshot> {
        self.with_slot(slot_index, move |slot, now| slot.set_policy(settings, now))
            .await
    }

    /// Validate a policy document and apply it.
    ///
    /// # Errors
    /// Returns `EngineError::Policy` for a malformed document, leaving the
    /// slot untouched, or `EngineError::UnknownSlot`.
    pub async fn set_policy_document(
        &self,
        slot_index: u16,
        document: PolicyDocument,
    ) -> Result<SlotSnapshot> {
        let settings = PolicySettings::try_from(document)?;
        self.set_policy(slot_index, settings).await
    }

    pub async fn enable(&self, slot_index: u16) -> Result<SlotSnapshot> {
        self.with_slot(slot_index, |slot, now| slot.enable(now)).await
    }

    pub async fn disable(&self, slot_index: u16) -> Result<SlotSnapshot> {
        self.with_slot(slot_index, |slot, now| slot.disable(now)).await
    }

    pub async fn set_code(&self, slot_index: u16, code: AccessCode) -> Result<SlotSnapshot> {
        self.with_slot(slot_index, move |slot, now| slot.set_code(code, now))
            .await
    }

    /// Clear a slot's policy, code and usage and resume reconciliation.
    pub async fn reset(&self, slot_index: u16) -> Result<SlotSnapshot> {
        self.with_slot(slot_index, |slot, now| slot.reset(now)).await
    }

    pub async fn reset_usage_count(&self, slot_index: u16) -> Result<SlotSnapshot> {
        self.with_slot(slot_index, |slot, now| slot.reset_usage_count(now))
            .await
    }

    /// Count one use of a slot's code.
    pub async fn record_use(&self, slot_index: u16) -> Result<SlotSnapshot> {
        self.with_slot(slot_index, |slot, now| slot.record_use(now))
            .await
    }

    /// Reset every slot of the lock.
    pub async fn reset_lock(&self) -> Vec<SlotSnapshot> {
        let now = self.clock.now();
        let (writes, snapshots): (Vec<_>, Vec<_>) = {
            let mut slots = self.slots.lock().await;
            slots
                .values_mut()
                .map(|slot| (slot.reset(now), self.snapshot_of(slot)))
                .unzip()
        };

        info!(lock_id = %self.lock_id(), slots = snapshots.len(), "Lock reset");
        self.issue_writes(writes.into_iter().flatten().collect()).await;
        snapshots
    }

    async fn with_slot<F>(&self, slot_index: u16, op: F) -> Result<SlotSnapshot>
    where
        F: FnOnce(&mut Slot, NaiveDateTime) -> Option<WriteCommand> + Send,
    {
        let now = self.clock.now();
        let (write, snapshot) = {
            let mut slots = self.slots.lock().await;
            let slot = slots
                .get_mut(&slot_index)
                .ok_or_else(|| EngineError::UnknownSlot {
                    lock: self.lock_id().clone(),
                    slot: slot_index,
                })?;
            let write = op(slot, now);
            (write, self.snapshot_of(slot))
        };

        if let Some(write) = write {
            self.issue_write(write).await;
        }
        Ok(snapshot)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// The lock reported a state change.
    ///
    /// Starts the confirmation timer when door notifications are on; an
    /// alarm report before it fires cancels it.
    pub fn on_lock_event(&self) {
        if !self.config.notify_door_opened {
            return;
        }

        let link = Arc::clone(&self.link);
        let notifier = Arc::clone(&self.notifier);
        let notification = self.notification(format!(
            "{} : Lock state changed and change event did not fire..",
            self.config.display_name()
        ));

        self.timers.start_once(
            TimerKind::LockConfirm,
            self.engine.lock_confirm_timeout_value(),
            async move {
                warn!(lock_id = %notification.lock_id, "Lock state change was not confirmed");
                deliver(link.as_ref(), notifier.as_ref(), notification).await;
            },
        );
    }

    /// The door sensor changed.
    pub async fn on_door_event(&self, opened: bool) {
        let name = self.config.display_name();

        if !opened {
            if self.timers.cancel(TimerKind::LeftOpen) {
                debug!(lock_id = %self.lock_id(), "Door closed, left-open reminder cancelled");
            }
            return;
        }

        if self.config.notify_door_opened {
            self.send(self.notification(format!("{name} has been opened.")))
                .await;
        }

        if self.config.notify_left_open {
            let link = Arc::clone(&self.link);
            let notifier = Arc::clone(&self.notifier);
            let lock_id = self.lock_id().clone();
            let target = self.config.notify_target.clone();
            let message = format!("{name} has been left open.");

            self.timers.start_repeating(
                TimerKind::LeftOpen,
                self.config.open_duration_value(),
                move || {
                    let link = Arc::clone(&link);
                    let notifier = Arc::clone(&notifier);
                    let notification = Notification::new(lock_id.clone(), message.clone())
                        .with_target(target.clone());
                    async move { deliver(link.as_ref(), notifier.as_ref(), notification).await }
                },
            );
        }
    }

    /// The lock sent an alarm report.
    ///
    /// Keypad events count a use of the slot named by `alarm_level`; other
    /// reports may raise a general notification. Any report confirms a
    /// pending lock state change.
    pub async fn on_alarm_event(&self, alarm_type: u32, alarm_level: u32) -> AlarmOutcome {
        self.timers.cancel(TimerKind::LockConfirm);

        let Some(vendor) = self.vendor else {
            error!(
                lock_id = %self.lock_id(),
                manufacturer = ?self.config.manufacturer,
                "Could not match lock manufacturer"
            );
            return AlarmOutcome::UnknownVendor;
        };

        let status = vendor.status(alarm_type).unwrap_or("Unknown");

        if vendor.is_user_event(alarm_type) {
            return self.on_slot_used(alarm_level, status).await;
        }

        let notified = self.config.notify_lock_general && vendor.should_notify(alarm_type);
        if notified {
            self.send(self.notification(format!(
                "{} status changed to {status}.",
                self.config.display_name()
            )))
            .await;
        }

        AlarmOutcome::StatusChange { status, notified }
    }

    async fn on_slot_used(&self, alarm_level: u32, status: &'static str) -> AlarmOutcome {
        let now = self.clock.now();
        let used = {
            let mut slots = self.slots.lock().await;
            u16::try_from(alarm_level)
                .ok()
                .and_then(|index| slots.get_mut(&index))
                .map(|slot| {
                    let write = slot.record_use(now);
                    let alert = slot.should_alert().then(|| slot.user_name().to_string());
                    (slot.index(), slot.usage_count(), write, alert)
                })
        };

        let Some((slot_index, usage_count, write, alert)) = used else {
            error!(lock_id = %self.lock_id(), alarm_level, status, "Lock state changed via unknown user");
            return AlarmOutcome::UnknownUser { alarm_level };
        };

        info!(lock_id = %self.lock_id(), slot = slot_index, usage_count, status, "Code slot used");

        if let Some(write) = write {
            self.issue_write(write).await;
        }
        if let Some(user_name) = alert {
            self.send(self.notification(format!("{status} : {user_name}.")))
                .await;
        }

        AlarmOutcome::SlotUsed { slot_index, status }
    }

    /// Cancel every pending timer of this lock.
    pub fn shutdown(&self) {
        self.timers.cancel_all();
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    /// Returns `false` if the lock rejected the write.
    async fn issue_write(&self, write: WriteCommand) -> bool {
        match self
            .link
            .write_code(&write.lock_id, write.slot_index, write.code)
            .await
        {
            Ok(()) => {
                debug!(
                    lock_id = %write.lock_id,
                    slot = write.slot_index,
                    clear = write.code.is_none(),
                    "Slot code written"
                );
                true
            }
            Err(e) => {
                warn!(
                    lock_id = %write.lock_id,
                    slot = write.slot_index,
                    error = %e,
                    "Slot write failed, will retry after next poll"
                );
                false
            }
        }
    }

    /// Issue writes one at a time. Returns the number that failed.
    async fn issue_writes(&self, writes: Vec<WriteCommand>) -> usize {
        let mut failures = 0;
        for write in writes {
            if !self.issue_write(write).await {
                failures += 1;
            }
        }
        failures
    }

    fn notification(&self, message: String) -> Notification {
        Notification::new(self.lock_id().clone(), message)
            .with_target(self.config.notify_target.clone())
    }

    async fn send(&self, notification: Notification) {
        deliver(self.link.as_ref(), self.notifier.as_ref(), notification).await;
    }
}

impl<L: LockLink, N: Notifier> Drop for LockCoordinator<L, N> {
    fn drop(&mut self) {
        self.timers.cancel_all();
    }
}

/// Best-effort delivery: skipped while the link is down, failures are
/// logged and never retried.
async fn deliver<L: LockLink, N: Notifier>(link: &L, notifier: &N, notification: Notification) {
    let lock_id = notification.lock_id.clone();
    if !link.is_ready() {
        debug!(%lock_id, message = %notification.message, "Link not ready, notification dropped");
        return;
    }
    if let Err(e) = notifier.notify(notification).await {
        warn!(%lock_id, error = %e, "Notification delivery failed");
    }
}
