//! Mock backends for testing and simulation.
//!
//! These implementations are controlled programmatically and need no lock
//! hardware or messaging service.

pub mod lock;
pub mod notifier;

pub use lock::{MockLockLink, MockLockLinkHandle, WriteRecord};
pub use notifier::RecordingNotifier;
