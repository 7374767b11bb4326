//! AION - declarative task pipelines over record-oriented data
//!
//! A pipeline document is an ordered list of task descriptors. Each task
//! consumes the current record store and produces the next one; the engine
//! runs them under per-task failure policies and records every attempt.
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/       JSON/YAML → PipelineDocument, task parameters    │
//! │  eval/      Conditions and cross-type comparison             │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  runtime/   Engine, stages, failure policies                 │
//! │  tasks/     Built-in resolvers (filter, sort, aggregate...)  │
//! │  registry   Task kind → resolver                             │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  store/     Record stores, run memory, field paths           │
//! │  event/     Execution log and sinks                          │
//! │  provider/  Model provider abstraction                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | Document parsing, schema checks, typed parameters, `explain` |
//! | [`eval`] | Condition trees, operators, loose equality, total ordering |
//! | [`runtime`] | Stage planning, retry backoff, `Engine::run` |
//! | [`tasks`] | `TaskResolver` trait and the built-in kinds |
//! | [`registry`] | Kind lookup and custom registration |
//! | [`store`] | Immutable `RecordStore` versions, shared `Memory` |
//! | [`event`] | `ExecutionLog`, `LogEntry`, log sinks |
//! | [`provider`] | `ModelProvider` trait, simulate/mock providers |
//! | [`config`] | Engine settings from TOML and `AION_*` variables |
//! | [`error`] | Error types with codes and fix suggestions |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL - documents and conditions
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod eval;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - execution
// ═══════════════════════════════════════════════════════════════
pub mod registry;
pub mod runtime;
pub mod tasks;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - storage, log, providers
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod provider;
pub mod store;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - errors, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{AionError, FixSuggestion, Result};

// Config types
pub use config::{EngineConfig, SummaryLimits};

// AST types (Domain Model)
pub use ast::{explain, FailurePolicy, PipelineDocument, RetrySpec, TaskDescriptor};

// Condition types
pub use eval::{Condition, Operator};

// Runtime types (Application Layer)
pub use registry::TaskRegistry;
pub use runtime::{Engine, InitialContext, RunReport, ValidationIssue};
pub use tasks::{TaskContext, TaskResolver};

// Event types
pub use event::{DataSummary, ExecutionLog, LogEntry, LogSink, MemorySink, TaskStatus, TracingSink};

// Store types
pub use store::{Memory, Record, RecordStore, TaskOutput};

// Provider types
pub use provider::{InferRequest, ModelProvider, ProviderRegistry};
