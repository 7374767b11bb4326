//! Store module - records, memory and field paths
//!
//! - `RecordStore`: immutable record collection, one version per task
//! - `Memory`: run-scoped key/value scope shared by all tasks
//! - `path`: dotted field lookup into records

mod memory;
pub mod path;
mod record;

pub use memory::Memory;
pub use record::{display_value, Record, RecordStore, TaskOutput};
