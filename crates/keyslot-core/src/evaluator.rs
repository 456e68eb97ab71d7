//! Slot access policy evaluation.
//!
//! [`evaluate`] is a pure function of the settings, the usage count and the
//! wall-clock time. Rules are checked in a fixed order and the first rule that
//! denies access decides the reason:
//!
//! 1. no settings
//! 2. disabled by user
//! 3. access count exhausted
//! 4. outside the date range
//! 5. no window for today, or outside today's window
//!
//! Count and date revocation come before time-of-day windows, so an expired or
//! used-up code is never re-enabled because the clock is inside its window.

use crate::policy::PolicySettings;
use crate::types::SlotState;
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Enabled,
    Disabled,
}

impl From<Verdict> for SlotState {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Enabled => SlotState::Enabled,
            Verdict::Disabled => SlotState::Disabled,
        }
    }
}

/// Why a slot is (or is not) allowed to hold its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    /// Not yet evaluated.
    Unknown,
    NoSettings,
    DisabledByUser,
    CountExceeded,
    OutsideDateRange,
    NotPermittedToday,
    OutsideTimeWindow,
    AccessGranted,
}

impl StatusReason {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            StatusReason::Unknown => "unknown",
            StatusReason::NoSettings => "no_settings",
            StatusReason::DisabledByUser => "disabled_by_user",
            StatusReason::CountExceeded => "count_exceeded",
            StatusReason::OutsideDateRange => "outside_date_range",
            StatusReason::NotPermittedToday => "not_permitted_today",
            StatusReason::OutsideTimeWindow => "outside_time_window",
            StatusReason::AccessGranted => "access_granted",
        }
    }

    /// Sentence shown to users in slot status displays.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            StatusReason::Unknown => "Unknown",
            StatusReason::NoSettings => "Settings are not present for this lock",
            StatusReason::DisabledByUser => "This user has been disabled.",
            StatusReason::CountExceeded => "This user has reached the amount of allowed logins.",
            StatusReason::OutsideDateRange => "This user does not have permission on this date.",
            StatusReason::NotPermittedToday => "This user does not have permission today.",
            StatusReason::OutsideTimeWindow => {
                "This user does not have permission during this time."
            }
            StatusReason::AccessGranted => "Access Granted",
        }
    }
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StatusReason::Unknown => write!(f, "unknown"),
            StatusReason::NoSettings => write!(f, "no settings"),
            StatusReason::DisabledByUser => write!(f, "disabled by user"),
            StatusReason::CountExceeded => write!(f, "count exceeded"),
            StatusReason::OutsideDateRange => write!(f, "outside date range"),
            StatusReason::NotPermittedToday => write!(f, "no permission today"),
            StatusReason::OutsideTimeWindow => write!(f, "outside time window"),
            StatusReason::AccessGranted => write!(f, "access granted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub reason: StatusReason,
}

impl Evaluation {
    fn denied(reason: StatusReason) -> Self {
        Self {
            verdict: Verdict::Disabled,
            reason,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.verdict == Verdict::Enabled
    }
}

/// Decide whether a slot may hold its code at `now`.
///
/// ```
/// use keyslot_core::{AccessCountRule, PolicySettings, StatusReason, Verdict, evaluate};
/// use chrono::NaiveDate;
///
/// let now = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(12, 0, 0).unwrap();
/// let settings = PolicySettings::new(true).with_access_count(AccessCountRule::new(true, 3));
///
/// assert_eq!(evaluate(Some(&settings), 2, now).verdict, Verdict::Enabled);
/// assert_eq!(evaluate(Some(&settings), 3, now).reason, StatusReason::CountExceeded);
/// assert_eq!(evaluate(None, 0, now).reason, StatusReason::NoSettings);
/// ```
#[must_use]
pub fn evaluate(
    settings: Option<&PolicySettings>,
    usage_count: u32,
    now: NaiveDateTime,
) -> Evaluation {
    let Some(settings) = settings else {
        return Evaluation::denied(StatusReason::NoSettings);
    };

    if !settings.enabled() {
        return Evaluation::denied(StatusReason::DisabledByUser);
    }

    if settings
        .access_count()
        .is_some_and(|rule| rule.is_exhausted(usage_count))
    {
        return Evaluation::denied(StatusReason::CountExceeded);
    }

    if settings
        .date_range()
        .is_some_and(|rule| !rule.permits(now.date()))
    {
        return Evaluation::denied(StatusReason::OutsideDateRange);
    }

    if let Some(rule) = settings.day_of_week().filter(|rule| rule.enabled()) {
        match rule.window_for(now.weekday()) {
            None => return Evaluation::denied(StatusReason::NotPermittedToday),
            Some(window) if !window.permits(now.time()) => {
                return Evaluation::denied(StatusReason::OutsideTimeWindow);
            }
            Some(_) => {}
        }
    }

    Evaluation {
        verdict: Verdict::Enabled,
        reason: StatusReason::AccessGranted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AccessCountRule, DateRangeRule, DayOfWeekRule, TimeWindow};
    use chrono::{NaiveDate, NaiveTime, Weekday};
    use rstest::rstest;

    // 2025-03-03 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn window(inclusive: bool) -> TimeWindow {
        TimeWindow::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            inclusive,
        )
        .unwrap()
    }

    fn monday_only(inclusive: bool) -> PolicySettings {
        PolicySettings::new(true)
            .with_day_of_week(DayOfWeekRule::new(true).with_day(Weekday::Mon, window(inclusive)))
    }

    #[test]
    fn test_no_settings() {
        let result = evaluate(None, 0, monday_at(12, 0));
        assert_eq!(result.verdict, Verdict::Disabled);
        assert_eq!(result.reason, StatusReason::NoSettings);
    }

    #[test]
    fn test_disabled_by_user() {
        let settings = PolicySettings::new(false);
        assert_eq!(
            evaluate(Some(&settings), 0, monday_at(12, 0)).reason,
            StatusReason::DisabledByUser
        );
    }

    #[test]
    fn test_no_rules_grants_access() {
        let settings = PolicySettings::new(true);
        let result = evaluate(Some(&settings), 1_000, monday_at(3, 0));
        assert!(result.is_enabled());
        assert_eq!(result.reason, StatusReason::AccessGranted);
    }

    #[rstest]
    #[case(8, 59, Verdict::Disabled)]
    #[case(9, 0, Verdict::Enabled)]
    #[case(17, 0, Verdict::Enabled)]
    #[case(17, 1, Verdict::Disabled)]
    fn test_inclusive_window_boundaries(#[case] h: u32, #[case] m: u32, #[case] expected: Verdict) {
        let result = evaluate(Some(&monday_only(true)), 0, monday_at(h, m));
        assert_eq!(result.verdict, expected);
        if expected == Verdict::Disabled {
            assert_eq!(result.reason, StatusReason::OutsideTimeWindow);
        }
    }

    #[rstest]
    #[case(12, 0, Verdict::Disabled)]
    #[case(8, 0, Verdict::Enabled)]
    #[case(9, 0, Verdict::Disabled)]
    #[case(17, 1, Verdict::Enabled)]
    fn test_exclusion_window(#[case] h: u32, #[case] m: u32, #[case] expected: Verdict) {
        let result = evaluate(Some(&monday_only(false)), 0, monday_at(h, m));
        assert_eq!(result.verdict, expected);
    }

    #[test]
    fn test_day_without_window_is_denied() {
        let tuesday = monday_at(12, 0) + chrono::TimeDelta::days(1);
        let result = evaluate(Some(&monday_only(true)), 0, tuesday);
        assert_eq!(result.reason, StatusReason::NotPermittedToday);
    }

    #[test]
    fn test_disabled_day_rule_is_ignored() {
        let settings = PolicySettings::new(true).with_day_of_week(DayOfWeekRule::new(false));
        assert!(evaluate(Some(&settings), 0, monday_at(12, 0)).is_enabled());
    }

    #[test]
    fn test_count_takes_precedence_over_date_and_time() {
        let settings = monday_only(true)
            .with_access_count(AccessCountRule::new(true, 3))
            .with_date_range(
                DateRangeRule::new(
                    true,
                    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
                )
                .unwrap(),
            );

        assert!(evaluate(Some(&settings), 2, monday_at(12, 0)).is_enabled());
        assert_eq!(
            evaluate(Some(&settings), 3, monday_at(12, 0)).reason,
            StatusReason::CountExceeded
        );
    }

    #[test]
    fn test_date_takes_precedence_over_time() {
        let settings = monday_only(true).with_date_range(
            DateRangeRule::new(
                true,
                NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
            )
            .unwrap(),
        );

        assert_eq!(
            evaluate(Some(&settings), 0, monday_at(12, 0)).reason,
            StatusReason::OutsideDateRange
        );
    }

    #[test]
    fn test_disabled_count_rule_is_ignored() {
        let settings = PolicySettings::new(true).with_access_count(AccessCountRule::new(false, 0));
        assert!(evaluate(Some(&settings), 10, monday_at(12, 0)).is_enabled());
    }

    #[test]
    fn test_verdict_maps_to_state() {
        assert_eq!(SlotState::from(Verdict::Enabled), SlotState::Enabled);
        assert_eq!(SlotState::from(Verdict::Disabled), SlotState::Disabled);
    }

    #[test]
    fn test_reason_texts() {
        assert_eq!(StatusReason::AccessGranted.description(), "Access Granted");
        assert_eq!(StatusReason::CountExceeded.to_string(), "count exceeded");
        assert_eq!(StatusReason::NotPermittedToday.code(), "not_permitted_today");
    }
}
