//! Row types of the slot database.

pub mod slot_row;

pub use slot_row::SlotRow;
