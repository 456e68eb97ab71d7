//! Emulated lock backend for testing and simulation.
//!
//! The emulated backend keeps slot codes in memory for any number of locks.
//! Writes land in that memory, so a poll after a write reads the new code
//! back, like a well-behaved lock. The paired [`MockLockLinkHandle`] changes
//! codes behind the engine's back and injects failures.

use crate::error::{LinkError, Result};
use crate::traits::LockLink;
use crate::types::ObservedCode;
use keyslot_core::{AccessCode, LockId, SlotRange};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One `write_code` call received by the emulated backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub lock_id: LockId,
    pub slot_index: u16,
    /// `None` for a clear.
    pub code: Option<AccessCode>,
    /// `false` when the write was failed on purpose.
    pub accepted: bool,
}

#[derive(Debug)]
struct LinkState {
    ready: bool,
    codes: HashMap<LockId, BTreeMap<u16, String>>,
    writes: Vec<WriteRecord>,
    polls: u32,
    refreshes: u32,
    fail_polls: bool,
    fail_writes: bool,
    failing_slots: HashSet<u16>,
    sticky: bool,
    poll_delay: Option<Duration>,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            ready: true,
            codes: HashMap::new(),
            writes: Vec::new(),
            polls: 0,
            refreshes: 0,
            fail_polls: false,
            fail_writes: false,
            failing_slots: HashSet::new(),
            sticky: false,
            poll_delay: None,
        }
    }
}

fn lock_state(state: &Mutex<LinkState>) -> MutexGuard<'_, LinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory lock backend.
///
/// # Examples
///
/// ```
/// use keyslot_core::{AccessCode, LockId, SlotRange};
/// use keyslot_link::mock::MockLockLink;
/// use keyslot_link::traits::LockLink;
///
/// #[tokio::main]
/// async fn main() -> keyslot_link::Result<()> {
///     let (link, handle) = MockLockLink::new();
///     let lock = LockId::new("lock.front").unwrap();
///
///     link.write_code(&lock, 1, Some(AccessCode::new(1234).unwrap())).await?;
///     handle.set_code(&lock, 2, "5678");
///
///     let observed = link.poll(&lock, SlotRange::new(1, 2).unwrap()).await?;
///     assert_eq!(observed[0].raw, "1234");
///     assert_eq!(observed[1].raw, "5678");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockLockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLockLink {
    /// Create an emulated backend and the handle that controls it.
    pub fn new() -> (Self, MockLockLinkHandle) {
        let state = Arc::new(Mutex::new(LinkState::default()));
        let link = Self {
            state: Arc::clone(&state),
        };
        (link, MockLockLinkHandle { state })
    }
}

impl LockLink for MockLockLink {
    fn is_ready(&self) -> bool {
        lock_state(&self.state).ready
    }

    async fn poll(&self, lock: &LockId, slots: SlotRange) -> Result<Vec<ObservedCode>> {
        let delay = {
            let mut state = lock_state(&self.state);
            state.polls += 1;
            state.poll_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = lock_state(&self.state);
        if !state.ready {
            return Err(LinkError::NotReady);
        }
        if state.fail_polls {
            return Err(LinkError::poll_failed(lock.as_str(), "node not responding"));
        }

        let codes = state.codes.get(lock);
        Ok(slots
            .iter()
            .map(|slot| {
                let raw = codes
                    .and_then(|codes| codes.get(&slot))
                    .cloned()
                    .unwrap_or_default();
                ObservedCode::new(slot, raw)
            })
            .collect())
    }

    async fn write_code(
        &self,
        lock: &LockId,
        slot_index: u16,
        code: Option<AccessCode>,
    ) -> Result<()> {
        let mut state = lock_state(&self.state);
        let failed = state.fail_writes || state.failing_slots.contains(&slot_index);

        state.writes.push(WriteRecord {
            lock_id: lock.clone(),
            slot_index,
            code,
            accepted: !failed,
        });

        if failed {
            return Err(LinkError::write_failed(
                lock.as_str(),
                slot_index,
                "command not acknowledged",
            ));
        }

        if !state.sticky {
            let codes = state.codes.entry(lock.clone()).or_default();
            match code {
                Some(code) => {
                    codes.insert(slot_index, code.to_string());
                }
                None => {
                    codes.remove(&slot_index);
                }
            }
        }

        Ok(())
    }

    async fn refresh_codes(&self, _lock: &LockId) -> Result<()> {
        lock_state(&self.state).refreshes += 1;
        Ok(())
    }
}

/// Control handle for a [`MockLockLink`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockLockLinkHandle {
    state: Arc<Mutex<LinkState>>,
}

impl MockLockLinkHandle {
    /// Put raw text in a slot, as if a user had programmed the lock directly.
    pub fn set_code(&self, lock: &LockId, slot_index: u16, raw: impl Into<String>) {
        lock_state(&self.state)
            .codes
            .entry(lock.clone())
            .or_default()
            .insert(slot_index, raw.into());
    }

    /// Empty a slot.
    pub fn clear_code(&self, lock: &LockId, slot_index: u16) {
        if let Some(codes) = lock_state(&self.state).codes.get_mut(lock) {
            codes.remove(&slot_index);
        }
    }

    /// Raw text currently held by a slot.
    #[must_use]
    pub fn code(&self, lock: &LockId, slot_index: u16) -> Option<String> {
        lock_state(&self.state)
            .codes
            .get(lock)
            .and_then(|codes| codes.get(&slot_index))
            .cloned()
    }

    /// Every write received so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        lock_state(&self.state).writes.clone()
    }

    /// Writes received for one slot.
    #[must_use]
    pub fn writes_to(&self, lock: &LockId, slot_index: u16) -> Vec<WriteRecord> {
        lock_state(&self.state)
            .writes
            .iter()
            .filter(|w| &w.lock_id == lock && w.slot_index == slot_index)
            .cloned()
            .collect()
    }

    pub fn clear_writes(&self) {
        lock_state(&self.state).writes.clear();
    }

    #[must_use]
    pub fn poll_count(&self) -> u32 {
        lock_state(&self.state).polls
    }

    #[must_use]
    pub fn refresh_count(&self) -> u32 {
        lock_state(&self.state).refreshes
    }

    pub fn set_ready(&self, ready: bool) {
        lock_state(&self.state).ready = ready;
    }

    /// Make every poll fail until turned off again.
    pub fn fail_polls(&self, fail: bool) {
        lock_state(&self.state).fail_polls = fail;
    }

    /// Make every write fail until turned off again.
    pub fn fail_writes(&self, fail: bool) {
        lock_state(&self.state).fail_writes = fail;
    }

    /// Make writes to one slot index fail, on any lock.
    pub fn fail_writes_to(&self, slot_index: u16) {
        lock_state(&self.state).failing_slots.insert(slot_index);
    }

    /// Acknowledge writes without storing them, like a lock that keeps
    /// reverting its codes.
    pub fn set_sticky(&self, sticky: bool) {
        lock_state(&self.state).sticky = sticky;
    }

    /// Delay every poll by `delay`.
    pub fn set_poll_delay(&self, delay: Duration) {
        lock_state(&self.state).poll_delay = Some(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock() -> LockId {
        LockId::new("lock.test").unwrap()
    }

    fn code(value: u64) -> AccessCode {
        AccessCode::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_poll_reports_every_slot() {
        let (link, handle) = MockLockLink::new();
        handle.set_code(&lock(), 2, "4321");

        let observed = link.poll(&lock(), SlotRange::new(1, 3).unwrap()).await.unwrap();
        assert_eq!(
            observed,
            vec![
                ObservedCode::new(1, ""),
                ObservedCode::new(2, "4321"),
                ObservedCode::new(3, ""),
            ]
        );
        assert_eq!(handle.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_write_then_clear() {
        let (link, handle) = MockLockLink::new();

        link.write_code(&lock(), 1, Some(code(1111))).await.unwrap();
        assert_eq!(handle.code(&lock(), 1).as_deref(), Some("1111"));

        link.write_code(&lock(), 1, None).await.unwrap();
        assert_eq!(handle.code(&lock(), 1), None);

        let writes = handle.writes_to(&lock(), 1);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].code, Some(code(1111)));
        assert_eq!(writes[1].code, None);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let (link, handle) = MockLockLink::new();

        handle.fail_polls(true);
        assert!(matches!(
            link.poll(&lock(), SlotRange::default()).await,
            Err(LinkError::PollFailed { .. })
        ));

        handle.fail_writes_to(4);
        assert!(link.write_code(&lock(), 4, Some(code(1))).await.is_err());
        assert!(link.write_code(&lock(), 5, Some(code(1))).await.is_ok());
        assert!(!handle.writes_to(&lock(), 4)[0].accepted);
    }

    #[tokio::test]
    async fn test_not_ready() {
        let (link, handle) = MockLockLink::new();
        handle.set_ready(false);

        assert!(!link.is_ready());
        assert_eq!(
            link.poll(&lock(), SlotRange::default()).await,
            Err(LinkError::NotReady)
        );
    }

    #[tokio::test]
    async fn test_sticky_lock_ignores_writes() {
        let (link, handle) = MockLockLink::new();
        handle.set_code(&lock(), 1, "0000");
        handle.set_sticky(true);

        link.write_code(&lock(), 1, Some(code(1234))).await.unwrap();
        assert_eq!(handle.code(&lock(), 1).as_deref(), Some("0000"));
        assert_eq!(handle.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_is_counted() {
        let (link, handle) = MockLockLink::new();
        link.refresh_codes(&lock()).await.unwrap();
        assert_eq!(handle.refresh_count(), 1);
    }
}
