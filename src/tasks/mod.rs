//! Task resolvers - one per task kind
//!
//! | Kind | Resolver | Output |
//! |------|----------|--------|
//! | `filter` | [`FilterResolver`] | records matching a condition |
//! | `sort` | [`SortResolver`] | stable sort on one field |
//! | `transform` | [`TransformResolver`] | one mapped record per input record |
//! | `aggregate` | [`AggregateResolver`] | one record per group |
//! | `model_call` | [`ModelCallResolver`] | input plus a model output field |
//! | `export` | [`ExportResolver`] | input unchanged (writes a file) |
//! | `memory` | [`MemoryResolver`] | write: input unchanged, read: stored records |
//!
//! Resolvers never mutate their input: each returns a new store version.

pub mod aggregate;
mod export;
mod filter;
mod memory;
mod model_call;
pub mod sort;
pub mod transform;

pub use aggregate::AggregateResolver;
pub use export::{write_export, ExportResolver};
pub use filter::{filter_records, FilterResolver};
pub use memory::MemoryResolver;
pub use model_call::{resolve_prompt, ModelCallResolver};
pub use sort::SortResolver;
pub use transform::TransformResolver;

use std::sync::Arc;

use async_trait::async_trait;

use crate::ast::TaskDescriptor;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::provider::ProviderRegistry;
use crate::registry::TaskRegistry;
use crate::store::{Memory, RecordStore, TaskOutput};

/// Per-invocation context handed to a resolver
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Position in the pipeline (0-based)
    pub task_index: usize,
    pub task_id: Option<String>,
    /// 1-based attempt number
    pub attempt: u32,
    /// Run-scoped shared memory
    pub memory: Memory,
}

impl TaskContext {
    pub fn new(task_index: usize, task_id: Option<String>, attempt: u32, memory: Memory) -> Self {
        Self {
            task_index,
            task_id,
            attempt,
            memory,
        }
    }

    /// Context with fresh, empty memory (tests and one-off calls)
    pub fn detached(task_index: usize) -> Self {
        Self::new(task_index, None, 1, Memory::new())
    }
}

/// Handler for one task kind
#[async_trait]
pub trait TaskResolver: Send + Sync {
    /// Check parameters without executing; runs once before the first attempt.
    ///
    /// Errors here are document defects and abort the run regardless of
    /// the task's failure policy.
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        let _ = task;
        Ok(())
    }

    /// Produce the next store version (or a scalar) from `input`
    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        ctx: &TaskContext,
    ) -> Result<TaskOutput>;
}

/// Register every built-in kind
pub fn register_builtins(
    registry: &mut TaskRegistry,
    providers: &ProviderRegistry,
    config: &EngineConfig,
) {
    registry.register("filter", Arc::new(FilterResolver));
    registry.register("sort", Arc::new(SortResolver));
    registry.register("transform", Arc::new(TransformResolver));
    registry.register("aggregate", Arc::new(AggregateResolver));
    registry.register(
        "model_call",
        Arc::new(ModelCallResolver::new(
            providers.clone(),
            config.default_provider.clone(),
            config.model_concurrency,
        )),
    );
    registry.register("export", Arc::new(ExportResolver));
    registry.register("memory", Arc::new(MemoryResolver));
}
