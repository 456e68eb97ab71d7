//! Slot access policy settings.
//!
//! A [`PolicySettings`] value describes when a code slot may hold its code:
//! an enable flag plus three optional rules (usage count, calendar range and
//! per-weekday time windows). Settings are immutable and always valid; the
//! loosely typed [`PolicyDocument`] is the only way in from JSON, and it is
//! checked once on conversion.
//!
//! # Document format
//!
//! ```
//! use keyslot_core::PolicySettings;
//!
//! let settings: PolicySettings = serde_json::from_str(r#"{
//!     "enabled": true,
//!     "user_name": "Dog walker",
//!     "notify_on_use": true,
//!     "access_count": { "enabled": true, "limit": 20 },
//!     "date_range": { "enabled": true, "begin_date": "2025-03-01", "end_date": "2025-03-31" },
//!     "day_of_week": {
//!         "enabled": true,
//!         "days": {
//!             "monday": { "start_time": "09:00", "end_time": "17:00", "inclusive": true }
//!         }
//!     }
//! }"#).unwrap();
//!
//! assert!(settings.enabled());
//! assert_eq!(settings.user_name(), "Dog walker");
//! ```

use crate::constants::{DATE_FORMAT, SHORT_TIME_FORMAT, TIME_FORMAT};
use crate::error::PolicyError;
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Revokes a slot once it has been used `limit` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCountRule {
    pub enabled: bool,
    pub limit: u32,
}

impl AccessCountRule {
    pub fn new(enabled: bool, limit: u32) -> Self {
        Self { enabled, limit }
    }

    /// Returns `true` when the rule is enabled and the limit has been reached.
    #[must_use]
    pub fn is_exhausted(&self, usage_count: u32) -> bool {
        self.enabled && usage_count >= self.limit
    }
}

/// Inclusive calendar bounds outside of which a slot is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRangeRule {
    enabled: bool,
    begin: NaiveDate,
    end: NaiveDate,
}

impl DateRangeRule {
    /// # Errors
    /// Returns `PolicyError::InvertedDateRange` if `begin` is after `end`.
    pub fn new(enabled: bool, begin: NaiveDate, end: NaiveDate) -> Result<Self, PolicyError> {
        if begin > end {
            return Err(PolicyError::InvertedDateRange { begin, end });
        }
        Ok(Self {
            enabled,
            begin,
            end,
        })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn begin(&self) -> NaiveDate {
        self.begin
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns `true` if the rule is disabled or `date` falls within the bounds.
    #[must_use]
    pub fn permits(&self, date: NaiveDate) -> bool {
        !self.enabled || (self.begin..=self.end).contains(&date)
    }
}

/// Time-of-day window for one weekday.
///
/// An inclusive window grants access only inside `[start, end]`. A
/// non-inclusive window is an exclusion window: access is denied inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
    inclusive: bool,
}

impl TimeWindow {
    /// # Errors
    /// Returns `PolicyError::InvertedTimeWindow` if `start` is after `end`.
    pub fn new(start: NaiveTime, end: NaiveTime, inclusive: bool) -> Result<Self, PolicyError> {
        if start > end {
            return Err(PolicyError::InvertedTimeWindow { start, end });
        }
        Ok(Self {
            start,
            end,
            inclusive,
        })
    }

    #[must_use]
    pub fn start(&self) -> NaiveTime {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveTime {
        self.end
    }

    #[must_use]
    pub fn inclusive(&self) -> bool {
        self.inclusive
    }

    /// Returns `true` if access is allowed at `time`. Both bounds are part of
    /// the window.
    #[must_use]
    pub fn permits(&self, time: NaiveTime) -> bool {
        let inside = (self.start..=self.end).contains(&time);
        if self.inclusive { inside } else { !inside }
    }
}

/// Per-weekday access windows. A weekday without a window denies access
/// all day while the rule is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayOfWeekRule {
    enabled: bool,
    days: [Option<TimeWindow>; 7],
}

impl DayOfWeekRule {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            days: [None; 7],
        }
    }

    pub fn with_day(mut self, day: Weekday, window: TimeWindow) -> Self {
        self.days[day.num_days_from_monday() as usize] = Some(window);
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn window_for(&self, day: Weekday) -> Option<&TimeWindow> {
        self.days[day.num_days_from_monday() as usize].as_ref()
    }

    /// Configured windows, Monday first.
    pub fn days(&self) -> impl Iterator<Item = (Weekday, &TimeWindow)> {
        WEEK.iter()
            .filter_map(|day| self.window_for(*day).map(|window| (*day, window)))
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Validated access policy of one code slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyDocument", into = "PolicyDocument")]
pub struct PolicySettings {
    enabled: bool,
    user_name: String,
    notify_on_use: bool,
    access_count: Option<AccessCountRule>,
    date_range: Option<DateRangeRule>,
    day_of_week: Option<DayOfWeekRule>,
}

impl PolicySettings {
    /// Create settings with no rules, an empty user name and use
    /// notifications off.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            user_name: String::new(),
            notify_on_use: false,
            access_count: None,
            date_range: None,
            day_of_week: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    pub fn with_notify_on_use(mut self, notify: bool) -> Self {
        self.notify_on_use = notify;
        self
    }

    pub fn with_access_count(mut self, rule: AccessCountRule) -> Self {
        self.access_count = Some(rule);
        self
    }

    pub fn with_date_range(mut self, rule: DateRangeRule) -> Self {
        self.date_range = Some(rule);
        self
    }

    pub fn with_day_of_week(mut self, rule: DayOfWeekRule) -> Self {
        self.day_of_week = Some(rule);
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    #[must_use]
    pub fn notify_on_use(&self) -> bool {
        self.notify_on_use
    }

    #[must_use]
    pub fn access_count(&self) -> Option<&AccessCountRule> {
        self.access_count.as_ref()
    }

    #[must_use]
    pub fn date_range(&self) -> Option<&DateRangeRule> {
        self.date_range.as_ref()
    }

    #[must_use]
    pub fn day_of_week(&self) -> Option<&DayOfWeekRule> {
        self.day_of_week.as_ref()
    }
}

/// Unvalidated wire shape of [`PolicySettings`].
///
/// Unknown keys are ignored. `notifications` and `begin_time` are accepted as
/// aliases of `notify_on_use` and `start_time`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub user_name: String,

    #[serde(default, alias = "notifications")]
    pub notify_on_use: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_count: Option<AccessCountRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRangeDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeekDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeDocument {
    pub enabled: bool,
    pub begin_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOfWeekDocument {
    pub enabled: bool,

    /// Lowercase weekday name to window.
    #[serde(default)]
    pub days: BTreeMap<String, TimeWindowDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowDocument {
    #[serde(alias = "begin_time")]
    pub start_time: String,
    pub end_time: String,
    pub inclusive: bool,
}

impl TryFrom<PolicyDocument> for PolicySettings {
    type Error = PolicyError;

    fn try_from(doc: PolicyDocument) -> Result<Self, PolicyError> {
        let mut settings = PolicySettings::new(doc.enabled)
            .with_user_name(doc.user_name)
            .with_notify_on_use(doc.notify_on_use);

        if let Some(rule) = doc.access_count {
            settings = settings.with_access_count(rule);
        }

        if let Some(range) = doc.date_range {
            let rule = DateRangeRule::new(
                range.enabled,
                parse_date(&range.begin_date)?,
                parse_date(&range.end_date)?,
            )?;
            settings = settings.with_date_range(rule);
        }

        if let Some(dow) = doc.day_of_week {
            let mut rule = DayOfWeekRule::new(dow.enabled);
            for (name, window) in &dow.days {
                let day = parse_day(name)?;
                let window = TimeWindow::new(
                    parse_time(&window.start_time)?,
                    parse_time(&window.end_time)?,
                    window.inclusive,
                )?;
                rule = rule.with_day(day, window);
            }
            settings = settings.with_day_of_week(rule);
        }

        Ok(settings)
    }
}

impl From<PolicySettings> for PolicyDocument {
    fn from(settings: PolicySettings) -> Self {
        PolicyDocument {
            enabled: settings.enabled,
            user_name: settings.user_name,
            notify_on_use: settings.notify_on_use,
            access_count: settings.access_count,
            date_range: settings.date_range.map(|rule| DateRangeDocument {
                enabled: rule.enabled,
                begin_date: rule.begin.format(DATE_FORMAT).to_string(),
                end_date: rule.end.format(DATE_FORMAT).to_string(),
            }),
            day_of_week: settings.day_of_week.map(|rule| DayOfWeekDocument {
                enabled: rule.enabled,
                days: rule
                    .days()
                    .map(|(day, window)| {
                        (
                            day_name(day).to_string(),
                            TimeWindowDocument {
                                start_time: window.start.format(TIME_FORMAT).to_string(),
                                end_time: window.end.format(TIME_FORMAT).to_string(),
                                inclusive: window.inclusive,
                            },
                        )
                    })
                    .collect(),
            }),
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, PolicyError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| PolicyError::InvalidDate {
        value: value.to_string(),
    })
}

fn parse_time(value: &str) -> Result<NaiveTime, PolicyError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, SHORT_TIME_FORMAT))
        .map_err(|_| PolicyError::InvalidTime {
            value: value.to_string(),
        })
}

fn parse_day(name: &str) -> Result<Weekday, PolicyError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        _ => Err(PolicyError::UnknownDay(name.to_string())),
    }
}

/// Lowercase English name of a weekday, as used in policy documents.
#[must_use]
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
