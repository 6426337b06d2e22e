//! Process-wide record of signal deliveries.
//!
//! This is the only state shared between handler context and the main line
//! of execution. Every field is an atomic primitive so that a handler can
//! update it at any instruction boundary without locks or allocation.
//!
//! - `slot`: per-signal counters and flags
//! - `table`: the fixed-size table plus the global pending-work flag

pub mod slot;
pub mod table;

pub use slot::{SignalSlot, UNKNOWN_SENDER};
pub use table::{SignalRecordTable, SIGNAL_SLOTS};
