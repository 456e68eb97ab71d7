//! Core constants for slot policy evaluation and reconciliation.
//!
//! These values mirror the behavior of deployed lock-manager installations:
//! the sync-error ceiling, poll cadence and timer durations are what operators
//! already expect, so changing them changes how aggressively a lock is written.
//!
//! # Usage
//!
//! ```
//! use keyslot_core::constants::*;
//! use std::time::Duration;
//!
//! let poll = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);
//! assert_eq!(poll.as_secs(), 30);
//! assert_eq!(SYNC_ERROR_CEILING, 5);
//! ```

// ============================================================================
// Reconciliation
// ============================================================================

/// Consecutive drift corrections allowed on one slot before the circuit opens.
///
/// Once a slot has disagreed with the lock this many polls in a row, no more
/// corrective writes are issued for it and a single escalation notification is
/// raised. A manual slot reset re-arms it.
pub const SYNC_ERROR_CEILING: u32 = 5;

/// Consecutive failed polls of one lock before the updater gives up on it.
pub const LINK_ERROR_LIMIT: u32 = 10;

/// Interval between two polls of the same lock (seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Timers
// ============================================================================

/// Delay before a lock event without a confirming alarm report is flagged (seconds).
pub const LOCK_CONFIRM_TIMEOUT_SECS: u64 = 30;

/// Default repeat period of the "door left open" reminder (seconds).
pub const DEFAULT_OPEN_DURATION_SECS: u64 = 300;

// ============================================================================
// Slot layout
// ============================================================================

/// First programmable slot on a freshly configured lock.
pub const DEFAULT_START_SLOT: u16 = 1;

/// Number of slots managed on a freshly configured lock.
pub const DEFAULT_SLOT_COUNT: u16 = 10;

// ============================================================================
// Codes and identifiers
// ============================================================================

/// Longest access code accepted, in digits.
pub const MAX_CODE_DIGITS: u32 = 10;

/// Longest lock identifier accepted, in bytes.
pub const MAX_LOCK_ID_LENGTH: usize = 255;

// ============================================================================
// Settings formats
// ============================================================================

/// Calendar date format used in policy documents.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time-of-day format used when serializing policy documents.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Short time-of-day format accepted when parsing policy documents.
pub const SHORT_TIME_FORMAT: &str = "%H:%M";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_layout_defaults_fit_in_u16() {
        let last = u32::from(DEFAULT_START_SLOT) + u32::from(DEFAULT_SLOT_COUNT) - 1;
        assert!(last <= u32::from(u16::MAX));
    }

    #[test]
    fn test_max_code_fits_in_u64() {
        assert!(10u64.checked_pow(MAX_CODE_DIGITS).is_some());
    }
}
