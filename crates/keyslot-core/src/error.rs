use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// Rejections raised while validating slot policy settings.
///
/// Settings are validated once, when they cross into the domain model. A slot
/// whose update is rejected keeps its previous settings and state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Invalid time '{value}': expected HH:MM or HH:MM:SS")]
    InvalidTime { value: String },

    #[error("Unknown day of week: {0}")]
    UnknownDay(String),

    #[error("Date range begins {begin} after it ends {end}")]
    InvertedDateRange { begin: NaiveDate, end: NaiveDate },

    #[error("Time window starts {start} after it ends {end}")]
    InvertedTimeWindow { start: NaiveTime, end: NaiveTime },
}

#[derive(Error, Debug)]
pub enum Error {
    // Policy errors
    #[error("Invalid slot policy: {0}")]
    Policy(#[from] PolicyError),

    // Identity errors
    #[error("Invalid lock id: {0}")]
    InvalidLockId(String),

    #[error("Invalid access code: {0}")]
    InvalidCode(String),

    #[error("Invalid slot range: {0}")]
    InvalidSlotRange(String),

    // State errors
    #[error("Unknown slot state: {0}")]
    UnknownState(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
