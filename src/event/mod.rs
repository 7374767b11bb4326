//! Event Module - execution log of a pipeline run
//!
//! Key types:
//! - `LogEntry`: one task attempt with bounded input/output summaries
//! - `ExecutionLog`: thread-safe, append-only log
//! - `LogSink`: forwarding hook (`TracingSink`, `MemorySink`)

mod log;
mod sink;

pub use log::{DataSummary, ExecutionLog, LogEntry, TaskStatus};
pub use sink::{LogSink, MemorySink, TracingSink};
