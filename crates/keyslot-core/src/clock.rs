//! Wall-clock sources for policy evaluation.
//!
//! Policies are written in local wall-clock terms ("weekdays 09:00 to 17:00"),
//! so evaluation works on naive local date-times. The clock is injected so the
//! engine can be driven deterministically in tests and by the CLI.

use chrono::{Local, NaiveDateTime, TimeDelta};
use std::sync::{Mutex, PoisonError};

/// Source of the current local date and time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the system's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to.
///
/// ```
/// use keyslot_core::{Clock, ManualClock};
/// use chrono::{NaiveDate, TimeDelta};
///
/// let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let clock = ManualClock::new(start);
/// clock.advance(TimeDelta::hours(2));
/// assert_eq!(clock.now(), start + TimeDelta::hours(2));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
