//! Lock backend and notification channel trait definitions.
//!
//! These traits are the boundary between the reconciliation engine and the
//! outside world: a [`LockLink`] reads and writes slot codes on physical
//! locks, a [`Notifier`] delivers alerts.
//!
//! Methods are declared as `fn ... -> impl Future<Output = ...> + Send` so the
//! engine can drive them from spawned Tokio tasks. Implementations may still
//! be written with plain `async fn`.

use crate::error::{NotifyError, Result};
use crate::types::{Notification, ObservedCode};
use keyslot_core::{AccessCode, LockId, SlotRange};
use std::future::Future;

/// Access to the slot codes of physical locks.
///
/// # Examples
///
/// ```no_run
/// use keyslot_core::{LockId, SlotRange};
/// use keyslot_link::traits::LockLink;
/// use keyslot_link::Result;
///
/// async fn dump<L: LockLink>(link: &L, lock: &LockId) -> Result<()> {
///     for observed in link.poll(lock, SlotRange::default()).await? {
///         println!("slot {}: {:?}", observed.slot_index, observed.raw);
///     }
///     Ok(())
/// }
/// ```
pub trait LockLink: Send + Sync + 'static {
    /// Whether the backend is ready to talk to locks.
    ///
    /// The engine skips polls while this returns `false`.
    fn is_ready(&self) -> bool;

    /// Read the raw code text of every slot in `slots`.
    ///
    /// Slots the lock did not report may be omitted.
    fn poll(
        &self,
        lock: &LockId,
        slots: SlotRange,
    ) -> impl Future<Output = Result<Vec<ObservedCode>>> + Send;

    /// Program `code` into a slot, or clear the slot when `code` is `None`.
    fn write_code(
        &self,
        lock: &LockId,
        slot_index: u16,
        code: Option<AccessCode>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Ask the lock to re-report its codes.
    fn refresh_codes(&self, lock: &LockId) -> impl Future<Output = Result<()>> + Send;
}

/// Delivery of human-readable alerts.
pub trait Notifier: Send + Sync + 'static {
    fn notify(
        &self,
        notification: Notification,
    ) -> impl Future<Output = std::result::Result<(), NotifyError>> + Send;
}
