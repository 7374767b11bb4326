//! Condition evaluation and value comparison
//!
//! - `Condition`: parsed filter predicate (leaf or all/any/not)
//! - `compare`: tolerant equality, operator ordering, total sort order

pub mod compare;
mod condition;

pub use compare::{loose_eq, ordered_cmp, total_cmp};
pub use condition::{cached_regex, Condition, Operator};

use crate::store::Record;

/// Evaluate a condition against one record (pure, never fails)
pub fn evaluate(record: &Record, condition: &Condition) -> bool {
    condition.evaluate(record)
}
