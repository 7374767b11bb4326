//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - AION-000-009: Document errors
//! - AION-010-019: Task resolution/validation errors
//! - AION-020-029: External capability errors
//! - AION-030-039: Memory errors
//! - AION-040-049: Run errors
//! - AION-050-059: Configuration/IO errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AionError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum AionError {
    // ═══════════════════════════════════════════
    // DOCUMENT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[AION-001] Malformed pipeline: {reason}")]
    MalformedPipeline { reason: String },

    #[error("[AION-002] Failed to parse pipeline document: {details}")]
    Parse { details: String },

    // ═══════════════════════════════════════════
    // TASK ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[AION-010] Unknown task kind '{kind}'")]
    UnknownTaskKind { kind: String },

    #[error("[AION-011] Invalid '{kind}' task: {reason}")]
    Validation { kind: String, reason: String },

    #[error("[AION-012] Unknown aggregation function '{function}' for field '{field}'")]
    UnknownAggregation { function: String, field: String },

    #[error("[AION-013] Unknown model provider '{provider}'")]
    UnknownProvider { provider: String },

    // ═══════════════════════════════════════════
    // EXTERNAL CAPABILITY ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[AION-020] External capability '{capability}' failed: {reason}")]
    ExternalCapability { capability: String, reason: String },

    #[error("[AION-021] Export to '{path}' failed: {reason}")]
    Export { path: String, reason: String },

    #[error("[AION-022] Task execution failed: {reason}")]
    Execution { reason: String },

    // ═══════════════════════════════════════════
    // MEMORY ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[AION-030] Memory key '{key}' not found")]
    MemoryKeyNotFound { key: String },

    // ═══════════════════════════════════════════
    // RUN ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[AION-040] Task {index} ('{kind}') failed after {attempts} attempt(s): {source}")]
    TaskFailed {
        index: usize,
        kind: String,
        attempts: u32,
        #[source]
        source: Box<AionError>,
    },

    #[error("[AION-041] Run timed out after {elapsed_ms}ms (limit {limit_ms}ms) before task {next_index}")]
    RunTimeout {
        elapsed_ms: u64,
        limit_ms: u64,
        next_index: usize,
    },

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[AION-050] Configuration error: {reason}")]
    Config { reason: String },

    #[error("[AION-051] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AionError {
    /// Shorthand for a resolver parameter error
    pub fn validation(kind: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors that indicate a defect in the document itself.
    ///
    /// These abort immediately: the failure policy is never consulted.
    pub fn is_document_defect(&self) -> bool {
        match self {
            Self::MalformedPipeline { .. }
            | Self::Parse { .. }
            | Self::UnknownTaskKind { .. }
            | Self::Validation { .. }
            | Self::UnknownAggregation { .. }
            | Self::UnknownProvider { .. } => true,
            Self::TaskFailed { source, .. } => source.is_document_defect(),
            _ => false,
        }
    }

    /// Errors the failure policy may retry or skip
    pub fn is_retryable(&self) -> bool {
        !self.is_document_defect()
    }

    /// Unwrap `TaskFailed` layers down to the resolver error
    pub fn root_cause(&self) -> &AionError {
        match self {
            Self::TaskFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Error code (e.g. "AION-011")
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPipeline { .. } => "AION-001",
            Self::Parse { .. } => "AION-002",
            Self::UnknownTaskKind { .. } => "AION-010",
            Self::Validation { .. } => "AION-011",
            Self::UnknownAggregation { .. } => "AION-012",
            Self::UnknownProvider { .. } => "AION-013",
            Self::ExternalCapability { .. } => "AION-020",
            Self::Export { .. } => "AION-021",
            Self::Execution { .. } => "AION-022",
            Self::MemoryKeyNotFound { .. } => "AION-030",
            Self::TaskFailed { .. } => "AION-040",
            Self::RunTimeout { .. } => "AION-041",
            Self::Config { .. } => "AION-050",
            Self::Io(_) => "AION-051",
        }
    }
}

impl FixSuggestion for AionError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            AionError::MalformedPipeline { .. } => {
                Some("A document needs a non-empty 'pipeline' list of objects with a 'task' field")
            }
            AionError::Parse { .. } => Some("Check JSON/YAML syntax: brackets, commas, indentation"),
            AionError::UnknownTaskKind { .. } => {
                Some("Use a built-in kind (filter, sort, transform, aggregate, model_call, export, memory) or register a resolver")
            }
            AionError::Validation { .. } => Some("Fix the task parameters; unknown keys are rejected"),
            AionError::UnknownAggregation { .. } => {
                Some("Use one of: count, count_distinct, sum, mean, avg, median, min, max, first, last")
            }
            AionError::UnknownProvider { .. } => {
                Some("Use provider 'simulate' or register the provider before running")
            }
            AionError::ExternalCapability { .. } => {
                Some("Transient provider failures can be retried with on_failure: {retry: {...}}")
            }
            AionError::Export { .. } => Some("Check the target path is writable"),
            AionError::Execution { .. } => None,
            AionError::MemoryKeyNotFound { .. } => {
                Some("Write the key first with a memory write task or store_as, or seed it in the initial context")
            }
            AionError::TaskFailed { source, .. } => source.fix_suggestion(),
            AionError::RunTimeout { .. } => Some("Raise run_timeout_ms or split the pipeline"),
            AionError::Config { .. } => Some("Check the TOML configuration file and AION_* variables"),
            AionError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
