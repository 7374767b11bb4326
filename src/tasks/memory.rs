use async_trait::async_trait;
use tracing::debug;

use super::{TaskContext, TaskResolver};
use crate::ast::params::{MemoryOperation, MemoryParams};
use crate::ast::{parse_params, TaskDescriptor};
use crate::error::{AionError, Result};
use crate::store::{RecordStore, TaskOutput};

/// `write` stores the current records under `key` (pass-through);
/// `read` replaces the current records with the stored value.
pub struct MemoryResolver;

#[async_trait]
impl TaskResolver for MemoryResolver {
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        let params: MemoryParams = parse_params(task)?;
        if params.key.is_empty() {
            return Err(AionError::validation("memory", "'key' cannot be empty"));
        }
        Ok(())
    }

    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        ctx: &TaskContext,
    ) -> Result<TaskOutput> {
        let params: MemoryParams = parse_params(task)?;
        match params.operation {
            MemoryOperation::Write => {
                ctx.memory.set(params.key.clone(), input.to_value());
                debug!(key = %params.key, records = input.len(), "stored records in memory");
                Ok(TaskOutput::Records(input.clone()))
            }
            MemoryOperation::Read => {
                let value = ctx.memory.require(&params.key)?;
                Ok(TaskOutput::Records(RecordStore::from_value(value)))
            }
        }
    }
}
