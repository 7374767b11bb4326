//! LogSink trait - forwarding execution log entries
//!
//! - `LogSink`: receives every entry as it is appended
//! - `TracingSink`: emits entries as `tracing` events (target `aion::log`)
//! - `MemorySink`: collects entries, for tests and embedding hosts

use parking_lot::Mutex;
use tracing::{info, warn};

use super::log::{LogEntry, TaskStatus};

/// Receives execution log entries as they are appended
pub trait LogSink: Send + Sync {
    fn record(&self, entry: &LogEntry);
}

/// Forwards entries to the `tracing` subscriber
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, entry: &LogEntry) {
        let records_in = entry.input_summary.record_count.unwrap_or(0);
        let records_out = entry
            .output_summary
            .as_ref()
            .and_then(|s| s.record_count)
            .unwrap_or(0);

        match entry.status {
            TaskStatus::Success => info!(
                target: "aion::log",
                task_index = entry.task_index,
                task_kind = %entry.task_kind,
                task_id = entry.task_id.as_deref().unwrap_or(""),
                attempt = entry.attempt,
                duration_ms = entry.duration_ms,
                records_in,
                records_out,
                status = entry.status.as_str(),
                "task completed"
            ),
            TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Retried => warn!(
                target: "aion::log",
                task_index = entry.task_index,
                task_kind = %entry.task_kind,
                task_id = entry.task_id.as_deref().unwrap_or(""),
                attempt = entry.attempt,
                duration_ms = entry.duration_ms,
                records_in,
                status = entry.status.as_str(),
                error = entry.error.as_deref().unwrap_or(""),
                "task did not succeed"
            ),
        }
    }
}

/// Collects entries in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }
}

impl LogSink for MemorySink {
    fn record(&self, entry: &LogEntry) {
        self.entries.lock().push(entry.clone());
    }
}
