//! SQLite persistence of code slot records.
//!
//! Each managed slot is one row of the `code_slots` table, keyed by lock id
//! and slot index. A row stores what is needed to rebuild the slot after a
//! restart: its state, its policy as a JSON document, the desired code and
//! the usage count. Everything else is re-derived by evaluating the policy.
//!
//! # Example
//!
//! ```no_run
//! use keyslot_core::{LockId, SlotRecord};
//! use keyslot_storage::{Database, DatabaseConfig, SlotRepository, SqliteSlotRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("keyslot.db")).await?;
//! let repo = SqliteSlotRepository::new(db.pool().clone());
//!
//! let lock = LockId::new("lock.front_door")?;
//! repo.upsert(&SlotRecord::new(lock.clone(), 1)).await?;
//!
//! for record in repo.find_by_lock(&lock).await? {
//!     println!("slot {} is {}", record.slot_index, record.state);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Validation
//!
//! Rows are validated when read. A settings blob that no longer parses, an
//! unknown state or an out-of-range number is reported as a
//! [`StorageError`] instead of silently falling back to defaults.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::SlotRow;
pub use repositories::{SlotRepository, SqliteSlotRepository};
