//! Pipeline engine - validate, explain and run documents
//!
//! A run threads one `TaskOutput` through the stages planned by
//! `plan_stages`. Each task resolves its kind, validates its parameters once,
//! then executes under its failure policy. Every attempt (and every skip or
//! abort decision) lands in the execution log.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::retry::RetryConfig;
use super::schedule::{plan_stages, Stage};
use crate::ast::{explain, FailurePolicy, PipelineDocument, TaskDescriptor};
use crate::config::EngineConfig;
use crate::error::{AionError, Result};
use crate::event::{DataSummary, ExecutionLog, LogEntry, LogSink, TaskStatus, TracingSink};
use crate::provider::{ModelProvider, ProviderRegistry};
use crate::registry::TaskRegistry;
use crate::store::{Memory, RecordStore, TaskOutput};
use crate::tasks::{register_builtins, TaskContext, TaskResolver};

// ═══════════════════════════════════════════════════════════════
// Run inputs and results
// ═══════════════════════════════════════════════════════════════

/// Starting records and memory for a run
#[derive(Debug, Clone, Default)]
pub struct InitialContext {
    pub records: RecordStore,
    pub memory: Map<String, Value>,
}

impl InitialContext {
    pub fn new(records: RecordStore) -> Self {
        Self {
            records,
            memory: Map::new(),
        }
    }

    /// Records from any JSON value (object, array, scalar or null)
    pub fn from_value(value: Value) -> Self {
        Self::new(RecordStore::from_value(value))
    }

    pub fn with_memory(mut self, key: impl Into<String>, value: Value) -> Self {
        self.memory.insert(key.into(), value);
        self
    }
}

/// Everything a run produced, success or not
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    /// Final context, or the error that stopped the run
    pub output: Result<TaskOutput>,
    pub log: Vec<LogEntry>,
    /// Memory as it stood when the run ended
    pub memory: Map<String, Value>,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }

    /// Final records (a scalar output is wrapped as `{"value": ...}`)
    pub fn records(&self) -> Option<RecordStore> {
        self.output.as_ref().ok().map(TaskOutput::to_records)
    }

    pub fn value(&self) -> Option<Value> {
        self.output.as_ref().ok().map(TaskOutput::to_value)
    }

    pub fn error(&self) -> Option<&AionError> {
        self.output.as_ref().err()
    }

    /// Log entries for one task position, in append order
    pub fn entries_for(&self, task_index: usize) -> Vec<&LogEntry> {
        self.log.iter().filter(|e| e.task_index == task_index).collect()
    }

    pub fn into_result(self) -> Result<TaskOutput> {
        self.output
    }
}

/// A problem found by `Engine::validate`
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Task position, `None` for document-level problems
    pub task_index: Option<usize>,
    pub kind: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.task_index, &self.kind) {
            (Some(i), Some(kind)) => write!(f, "task {} ({}): {}", i, kind, self.message),
            (Some(i), None) => write!(f, "task {}: {}", i, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

enum TaskOutcome {
    Completed(TaskOutput),
    Skipped,
    Aborted(AionError),
}

// ═══════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════

/// Task registry, provider registry, config and log sinks for running
/// pipeline documents
pub struct Engine {
    registry: TaskRegistry,
    providers: ProviderRegistry,
    config: EngineConfig,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl Engine {
    /// Engine with default config and every built-in task kind
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let providers = ProviderRegistry::new();
        let mut registry = TaskRegistry::new();
        register_builtins(&mut registry, &providers, &config);

        let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();
        if config.tracing_sink {
            sinks.push(Arc::new(TracingSink));
        }

        Self {
            registry,
            providers,
            config,
            sinks,
        }
    }

    /// Register (or replace) the resolver for a task kind
    pub fn register(&mut self, kind: impl Into<String>, resolver: Arc<dyn TaskResolver>) {
        self.registry.register(kind, resolver);
    }

    /// Register a model provider under its own name
    pub fn register_provider(&self, provider: Arc<dyn ModelProvider>) {
        self.providers.register(provider);
    }

    pub fn add_sink(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Human-readable description of a document
    pub fn explain(&self, doc: &PipelineDocument) -> String {
        explain(doc)
    }

    /// Check a document without running it: structure, task kinds and
    /// every resolver's parameter validation. Empty means runnable.
    pub fn validate(&self, doc: &PipelineDocument) -> Vec<ValidationIssue> {
        if let Err(e) = doc.check_structure() {
            return vec![ValidationIssue {
                task_index: None,
                kind: None,
                message: e.to_string(),
            }];
        }

        doc.pipeline
            .iter()
            .enumerate()
            .filter_map(|(i, task)| {
                let checked = self
                    .registry
                    .resolve(&task.task)
                    .and_then(|resolver| resolver.validate(task));
                checked.err().map(|e| ValidationIssue {
                    task_index: Some(i),
                    kind: Some(task.task.clone()),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Parse a raw document and run it; parse errors come back in the report
    pub async fn run_value(&self, document: Value, initial: InitialContext) -> RunReport {
        match PipelineDocument::from_value(document) {
            Ok(doc) => self.run(&doc, initial).await,
            Err(e) => RunReport {
                run_id: Uuid::new_v4().to_string(),
                output: Err(e),
                log: Vec::new(),
                memory: initial.memory,
                duration: Duration::ZERO,
            },
        }
    }

    /// Run a document from the given starting context
    #[instrument(skip_all, fields(tasks = doc.len(), run_id = tracing::field::Empty))]
    pub async fn run(&self, doc: &PipelineDocument, initial: InitialContext) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        let started = Instant::now();

        info!(records = initial.records.len(), "Starting pipeline run");

        let memory = Memory::from_map(initial.memory);
        let log = ExecutionLog::with_sinks(self.sinks.clone());
        let output = self
            .execute(doc, initial.records, &memory, &log, started)
            .await;
        let duration = started.elapsed();

        match &output {
            Ok(_) => info!(duration_ms = duration.as_millis() as u64, "Pipeline completed"),
            Err(e) => warn!(duration_ms = duration.as_millis() as u64, error = %e, "Pipeline failed"),
        }

        RunReport {
            run_id,
            output,
            log: log.entries(),
            memory: memory.snapshot(),
            duration,
        }
    }

    async fn execute(
        &self,
        doc: &PipelineDocument,
        records: RecordStore,
        memory: &Memory,
        log: &ExecutionLog,
        started: Instant,
    ) -> Result<TaskOutput> {
        doc.check_structure()?;

        let mut current = TaskOutput::Records(records);
        for stage in plan_stages(&doc.pipeline) {
            if let Some(limit_ms) = self.config.run_timeout_ms {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                if elapsed_ms >= limit_ms {
                    return Err(AionError::RunTimeout {
                        elapsed_ms,
                        limit_ms,
                        next_index: stage.first_index(),
                    });
                }
            }

            let input = current.to_records();
            match stage {
                Stage::Chain(index) => {
                    let mut entries = EntryBuffer::live(log);
                    let outcome = self
                        .run_task(index, &doc.pipeline[index], &input, memory, &mut entries)
                        .await;
                    match outcome {
                        TaskOutcome::Completed(output) => current = output,
                        TaskOutcome::Skipped => {}
                        TaskOutcome::Aborted(e) => return Err(e),
                    }
                }
                Stage::Branches(indices) => {
                    let input = &input;
                    let results = join_all(indices.iter().map(|&i| async move {
                        let mut entries = EntryBuffer::held();
                        let outcome = self
                            .run_task(i, &doc.pipeline[i], input, memory, &mut entries)
                            .await;
                        (entries.into_held(), outcome)
                    }))
                    .await;

                    // Declaration order, whatever order the branches finished in
                    let mut first_error = None;
                    for (entries, outcome) in results {
                        entries.into_iter().for_each(|e| {
                            log.append(e);
                        });
                        if let TaskOutcome::Aborted(e) = outcome {
                            first_error.get_or_insert(e);
                        }
                    }
                    if let Some(e) = first_error {
                        return Err(e);
                    }
                }
            }
        }

        Ok(current)
    }

    /// One task under its failure policy
    async fn run_task(
        &self,
        index: usize,
        task: &TaskDescriptor,
        input: &RecordStore,
        memory: &Memory,
        entries: &mut EntryBuffer<'_>,
    ) -> TaskOutcome {
        let limits = &self.config.summary;
        let input_summary = DataSummary::of_records(input, limits);
        let entry = |attempt: u32, status: TaskStatus| {
            LogEntry::new(
                index,
                task.id.clone(),
                task.task.as_str(),
                attempt,
                input_summary.clone(),
                status,
            )
        };
        let checked = self
            .registry
            .resolve(&task.task)
            .and_then(|resolver| resolver.validate(task).map(|_| resolver));
        let resolver = match checked {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!(task = index, kind = %task.task, error = %e, "Task rejected");
                entries.push(entry(0, TaskStatus::Failed).with_error(&e));
                return TaskOutcome::Aborted(task_failed(index, task, 0, e));
            }
        };

        let policy = task.failure_policy();
        let retry = match &policy {
            FailurePolicy::Retry(spec) => RetryConfig::from(spec),
            _ => RetryConfig::none(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let ctx = TaskContext::new(index, task.id.clone(), attempt, memory.clone());
            let start = Instant::now();
            let result = resolver.execute(input, task, &ctx).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let err = match result {
                Ok(output) => {
                    if let Some(key) = &task.store_as {
                        memory.set(key.clone(), output.to_value());
                    }
                    entries.push(
                        entry(attempt, TaskStatus::Success)
                            .with_output(DataSummary::of_output(&output, limits))
                            .with_duration_ms(duration_ms),
                    );
                    return TaskOutcome::Completed(output);
                }
                Err(err) => err,
            };

            if err.is_retryable() && attempt < retry.max_attempts() {
                let delay = retry.delay_for(attempt);
                warn!(
                    task = index,
                    kind = %task.task,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Task attempt failed, retrying"
                );
                entries.push(
                    entry(attempt, TaskStatus::Retried)
                        .with_duration_ms(duration_ms)
                        .with_error(&err),
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if err.is_retryable() && matches!(policy, FailurePolicy::Skip) {
                warn!(task = index, kind = %task.task, error = %err, "Task failed, skipping");
                entries.push(
                    entry(attempt, TaskStatus::Skipped)
                        .with_duration_ms(duration_ms)
                        .with_error(&err),
                );
                return TaskOutcome::Skipped;
            }

            entries.push(
                entry(attempt, TaskStatus::Failed)
                    .with_duration_ms(duration_ms)
                    .with_error(&err),
            );
            return TaskOutcome::Aborted(task_failed(index, task, attempt, err));
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("kinds", &self.registry.kinds())
            .field("providers", &self.providers.names())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Where `run_task` puts its entries: straight into the log, or held until
/// a branch stage can append them in declaration order
enum EntryBuffer<'a> {
    Live(&'a ExecutionLog),
    Held(Vec<LogEntry>),
}

impl<'a> EntryBuffer<'a> {
    fn live(log: &'a ExecutionLog) -> Self {
        Self::Live(log)
    }

    fn held() -> Self {
        Self::Held(Vec::new())
    }

    fn push(&mut self, entry: LogEntry) {
        match self {
            Self::Live(log) => {
                log.append(entry);
            }
            Self::Held(entries) => entries.push(entry),
        }
    }

    fn into_held(self) -> Vec<LogEntry> {
        match self {
            Self::Live(_) => Vec::new(),
            Self::Held(entries) => entries,
        }
    }
}

fn task_failed(index: usize, task: &TaskDescriptor, attempts: u32, source: AionError) -> AionError {
    AionError::TaskFailed {
        index,
        kind: task.task.clone(),
        attempts,
        source: Box::new(source),
    }
}
