//! Code slot reconciliation engine.
//!
//! The engine keeps the code slots of one or more locks in line with their
//! policies. For every lock it:
//!
//! 1. evaluates each slot's policy against the current time and usage count
//! 2. enables or disables the slot, writing or clearing its code on the lock
//! 3. polls the lock and re-asserts slots whose code drifted
//! 4. suspends a slot that keeps drifting, until it is reset
//!
//! # Architecture
//!
//! - [`Slot`]: state machine of one slot; returns writes instead of issuing them
//! - [`DriftDetector`]: compares observed codes with slot state
//! - [`LockCoordinator`]: owns the slots of one lock and talks to its link
//! - [`PollScheduler`]: polls one coordinator on an interval
//! - [`LockRegistry`]: every loaded lock, keyed by lock id
//! - [`SlotStore`]: where slot records are kept between runs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyslot_core::{LockConfig, LockId, SystemClock};
//! use keyslot_engine::{EngineConfig, LockRegistry, MemoryStore};
//! use keyslot_link::LogNotifier;
//! use keyslot_link::mock::MockLockLink;
//!
//! #[tokio::main]
//! async fn main() -> keyslot_engine::Result<()> {
//!     let (link, _handle) = MockLockLink::new();
//!     let registry = LockRegistry::new(
//!         EngineConfig::default(),
//!         Arc::new(link),
//!         Arc::new(LogNotifier::default()),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(SystemClock),
//!     );
//!
//!     let lock = LockId::new("lock.front")?;
//!     registry.load(LockConfig::new(lock.clone()).name("Front Door")).await?;
//!     registry.on_door_event(&lock, true).await?;
//!     registry.unload_all().await
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod drift;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod slot;
pub mod store;
pub mod timers;

pub use config::EngineConfig;
pub use coordinator::{AlarmOutcome, LockCoordinator, PollOutcome, PollReport};
pub use drift::{DriftDetector, DriftOutcome};
pub use error::{EngineError, Result};
pub use registry::LockRegistry;
pub use scheduler::PollScheduler;
pub use slot::{Slot, SlotSnapshot, StateTransition, WriteCommand};
pub use store::{MemoryStore, SlotStore};
pub use timers::{TimerKind, TimerSet};
