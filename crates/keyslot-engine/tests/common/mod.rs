//! Shared fixtures for engine integration tests.
//!
//! Every test gets an emulated lock, a recording notifier and a manual clock
//! set to Monday 2025-03-03 12:00.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use keyslot_core::{AccessCode, Clock, LockConfig, LockId, ManualClock};
use keyslot_engine::{EngineConfig, LockCoordinator};
use keyslot_link::mock::{MockLockLink, MockLockLinkHandle, RecordingNotifier};
use std::sync::Arc;

pub type TestCoordinator = LockCoordinator<MockLockLink, RecordingNotifier>;

pub struct Harness {
    pub coordinator: Arc<TestCoordinator>,
    pub handle: MockLockLinkHandle,
    pub notifier: RecordingNotifier,
    pub clock: Arc<ManualClock>,
}

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 3)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn lock_id() -> LockId {
    LockId::new("lock.front_door").unwrap()
}

pub fn code(value: u64) -> AccessCode {
    AccessCode::new(value).unwrap()
}

pub fn lock_config() -> LockConfig {
    LockConfig::new(lock_id()).name("Front Door")
}

pub fn harness() -> Harness {
    harness_with(lock_config(), EngineConfig::default())
}

pub fn harness_with(config: LockConfig, engine: EngineConfig) -> Harness {
    let (link, handle) = MockLockLink::new();
    let notifier = RecordingNotifier::new();
    let clock = Arc::new(ManualClock::new(at(12, 0)));

    let coordinator = Arc::new(LockCoordinator::new(
        config,
        engine,
        Arc::new(link),
        Arc::new(notifier.clone()),
        Arc::clone(&clock) as Arc<dyn Clock>,
    ));

    Harness {
        coordinator,
        handle,
        notifier,
        clock,
    }
}
