//! ExecutionLog - per-task audit trail of a run
//!
//! - `LogEntry`: one resolver attempt (or skip/abort decision)
//! - `DataSummary`: bounded view of a task's input or output
//! - `ExecutionLog`: thread-safe, append-only, forwards entries to sinks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sink::LogSink;
use crate::config::SummaryLimits;
use crate::store::{RecordStore, TaskOutput};

/// Outcome of one logged attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failed,
    Skipped,
    /// Failed, and another attempt follows
    Retried,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Retried => "retried",
        }
    }
}

/// Bounded description of a record store or scalar output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    /// "records" or "value"
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    /// Field names, first-seen order, at most `max_fields`
    pub fields: Vec<String>,
    /// More fields existed than were listed
    #[serde(default)]
    pub fields_truncated: bool,
    /// Compact JSON, at most `max_preview_chars` characters
    pub preview: String,
}

impl DataSummary {
    pub fn of_records(store: &RecordStore, limits: &SummaryLimits) -> Self {
        let all_fields = store.fields();
        let fields_truncated = all_fields.len() > limits.max_fields;
        let fields = all_fields.into_iter().take(limits.max_fields).collect();

        // Serialize only as many records as the preview can show
        let mut preview = String::from("[");
        for (i, record) in store.iter().enumerate() {
            if preview.len() > limits.max_preview_chars {
                break;
            }
            if i > 0 {
                preview.push(',');
            }
            preview.push_str(&serde_json::to_string(record).unwrap_or_default());
        }
        preview.push(']');

        Self {
            kind: "records".to_string(),
            record_count: Some(store.len()),
            fields,
            fields_truncated,
            preview: truncate_chars(preview, limits.max_preview_chars),
        }
    }

    pub fn of_value(value: &Value, limits: &SummaryLimits) -> Self {
        let (fields, fields_truncated) = match value {
            Value::Object(map) => (
                map.keys().take(limits.max_fields).cloned().collect(),
                map.len() > limits.max_fields,
            ),
            _ => (Vec::new(), false),
        };
        Self {
            kind: "value".to_string(),
            record_count: None,
            fields,
            fields_truncated,
            preview: truncate_chars(value.to_string(), limits.max_preview_chars),
        }
    }

    pub fn of_output(output: &TaskOutput, limits: &SummaryLimits) -> Self {
        match output {
            TaskOutput::Records(store) => Self::of_records(store, limits),
            TaskOutput::Value(value) => Self::of_value(value, limits),
        }
    }
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut short = text[..cut].to_string();
            short.push_str("...");
            short
        }
        None => text,
    }
}

/// One execution log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number within the run
    pub seq: u64,
    /// Time since run start (ms) when the entry was appended
    pub timestamp_ms: u64,
    pub task_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub task_kind: String,
    /// 1-based attempt number (0 when the task never ran)
    pub attempt: u32,
    pub input_summary: DataSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<DataSummary>,
    pub duration_ms: u64,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    pub fn new(
        task_index: usize,
        task_id: Option<String>,
        task_kind: impl Into<String>,
        attempt: u32,
        input_summary: DataSummary,
        status: TaskStatus,
    ) -> Self {
        Self {
            seq: 0,
            timestamp_ms: 0,
            task_index,
            task_id,
            task_kind: task_kind.into(),
            attempt,
            input_summary,
            output_summary: None,
            duration_ms: 0,
            status,
            error: None,
        }
    }

    pub fn with_output(mut self, summary: DataSummary) -> Self {
        self.output_summary = Some(summary);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Thread-safe, append-only execution log
#[derive(Clone)]
pub struct ExecutionLog {
    entries: Arc<RwLock<Vec<LogEntry>>>,
    sinks: Arc<Vec<Arc<dyn LogSink>>>,
    start_time: Instant,
    next_seq: Arc<AtomicU64>,
}

impl ExecutionLog {
    /// Create a new log (call at run start)
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            sinks: Arc::new(sinks),
            start_time: Instant::now(),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an entry (assigns seq + timestamp), returns its seq
    pub fn append(&self, mut entry: LogEntry) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        entry.seq = seq;
        entry.timestamp_ms = self.start_time.elapsed().as_millis() as u64;

        for sink in self.sinks.iter() {
            sink.record(&entry);
        }
        self.entries.write().push(entry);
        seq
    }

    /// All entries (cloned - use `with_entries` for zero-copy access)
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Zero-copy access via callback; holds the read lock, keep it short
    pub fn with_entries<T>(&self, f: impl FnOnce(&[LogEntry]) -> T) -> T {
        f(&self.entries.read())
    }

    /// Entries for one task position
    pub fn filter_task(&self, task_index: usize) -> Vec<LogEntry> {
        self.with_entries(|entries| {
            entries
                .iter()
                .filter(|e| e.task_index == task_index)
                .cloned()
                .collect()
        })
    }

    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.with_entries(|entries| entries.iter().filter(|e| e.status == status).count())
    }

    pub fn to_json(&self) -> Value {
        self.with_entries(|entries| serde_json::to_value(entries).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLog")
            .field("len", &self.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ═══════════════════════════════════════════════════════════════
    // Test helpers
    // ═══════════════════════════════════════════════════════════════

    fn limits(max_fields: usize, max_preview_chars: usize) -> SummaryLimits {
        SummaryLimits {
            max_fields,
            max_preview_chars,
        }
    }

    fn entry(index: usize, status: TaskStatus) -> LogEntry {
        let input = DataSummary::of_records(&RecordStore::empty(), &SummaryLimits::default());
        LogEntry::new(index, None, "sort", 1, input, status)
    }

    // ═══════════════════════════════════════════════════════════════
    // DataSummary
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn summary_bounds_fields_and_preview() {
        let store = RecordStore::from_value(json!([
            {"a": 1, "b": 2, "c": 3},
            {"d": "x".repeat(100)}
        ]));
        let summary = DataSummary::of_records(&store, &limits(2, 20));
        assert_eq!(summary.record_count, Some(2));
        assert_eq!(summary.fields, vec!["a", "b"]);
        assert!(summary.fields_truncated);
        assert_eq!(summary.preview.chars().count(), 23);
        assert!(summary.preview.ends_with("..."));
    }

    #[test]
    fn summary_of_small_store_is_exact() {
        let store = RecordStore::from_value(json!([{"a": 1}]));
        let summary = DataSummary::of_records(&store, &SummaryLimits::default());
        assert_eq!(summary.preview, r#"[{"a":1}]"#);
        assert!(!summary.fields_truncated);
    }

    #[test]
    fn summary_of_scalar() {
        let summary = DataSummary::of_output(&TaskOutput::Value(json!(42)), &SummaryLimits::default());
        assert_eq!(summary.kind, "value");
        assert_eq!(summary.record_count, None);
        assert_eq!(summary.preview, "42");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo".to_string(), 2), "hé...");
        assert_eq!(truncate_chars("hi".to_string(), 2), "hi");
    }

    // ═══════════════════════════════════════════════════════════════
    // ExecutionLog
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn append_assigns_monotonic_seq() {
        let log = ExecutionLog::new();
        assert_eq!(log.append(entry(0, TaskStatus::Retried)), 0);
        assert_eq!(log.append(entry(0, TaskStatus::Success)), 1);
        assert_eq!(log.append(entry(1, TaskStatus::Skipped)), 2);

        assert_eq!(log.len(), 3);
        assert_eq!(log.filter_task(0).len(), 2);
        assert_eq!(log.count_status(TaskStatus::Skipped), 1);
    }

    #[test]
    fn clones_share_entries() {
        let log = ExecutionLog::new();
        let clone = log.clone();
        clone.append(entry(0, TaskStatus::Success));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(entry(3, TaskStatus::Retried).with_error("boom")).unwrap();
        assert_eq!(json["status"], "retried");
        assert_eq!(json["task_index"], 3);
        assert_eq!(json["error"], "boom");
        assert!(json.get("task_id").is_none());
    }
}
