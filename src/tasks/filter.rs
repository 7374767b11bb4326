use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{TaskContext, TaskResolver};
use crate::ast::params::FilterParams;
use crate::ast::{parse_params, TaskDescriptor};
use crate::error::Result;
use crate::eval::Condition;
use crate::store::{RecordStore, TaskOutput};

/// Records for which `condition` holds, in input order
pub fn filter_records(input: &RecordStore, condition: &Condition) -> RecordStore {
    input
        .iter()
        .filter(|record| condition.evaluate(record))
        .cloned()
        .collect()
}

pub struct FilterResolver;

#[async_trait]
impl TaskResolver for FilterResolver {
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        parse_params::<FilterParams>(task).map(|_| ())
    }

    #[instrument(name = "filter", skip_all, fields(records_in = input.len()))]
    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        _ctx: &TaskContext,
    ) -> Result<TaskOutput> {
        let params: FilterParams = parse_params(task)?;
        let output = filter_records(input, &params.condition);
        debug!(records_out = output.len(), condition = %params.condition, "filtered");
        Ok(TaskOutput::Records(output))
    }
}
