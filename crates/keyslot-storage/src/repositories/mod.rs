pub mod slot;

pub use slot::{SlotRepository, SqliteSlotRepository};
