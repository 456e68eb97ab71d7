//! Lock backend abstraction for the keyslot reconciliation engine.
//!
//! This crate defines the two collaborators the engine talks to:
//!
//! - [`LockLink`]: reads raw slot codes from locks and writes or clears them.
//! - [`Notifier`]: delivers human-readable alerts.
//!
//! It also carries the vendor alarm tables used to interpret lock activity
//! reports, an emulated lock backend and a recording notifier for tests and
//! the `keyslot` simulator.
//!
//! # Example
//!
//! ```no_run
//! use keyslot_core::{AccessCode, LockId};
//! use keyslot_link::{LockLink, Result};
//!
//! async fn program<L: LockLink>(link: &L, lock: &LockId, slot: u16, code: u64) -> Result<()> {
//!     let code = AccessCode::new(code).map_err(|e| keyslot_link::LinkError::other(e.to_string()))?;
//!     link.write_code(lock, slot, Some(code)).await
//! }
//! ```
//!
//! # Error Handling
//!
//! Backend failures are [`LinkError`] values and notification failures are
//! [`NotifyError`] values. Neither is fatal: the engine logs them and carries
//! on with the next slot or the next poll.

pub mod error;
pub mod log_notifier;
pub mod mock;
pub mod traits;
pub mod types;
pub mod vendor;

pub use error::{LinkError, NotifyError, Result};
pub use log_notifier::LogNotifier;
pub use traits::{LockLink, Notifier};
pub use types::{Notification, ObservedCode};
pub use vendor::LockVendor;
