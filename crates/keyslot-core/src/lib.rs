pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod record;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LockConfig;
pub use error::{Error, PolicyError, Result};
pub use evaluator::{Evaluation, StatusReason, Verdict, evaluate};
pub use policy::{
    AccessCountRule, DateRangeRule, DayOfWeekRule, PolicyDocument, PolicySettings, TimeWindow,
};
pub use record::SlotRecord;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
