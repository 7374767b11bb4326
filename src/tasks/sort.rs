//! Stable single-field sort
//!
//! Uses the total order of `eval::total_cmp`: missing/null first in
//! ascending order, last in descending order. Ties keep input order in
//! both directions.

use async_trait::async_trait;
use tracing::instrument;

use super::{TaskContext, TaskResolver};
use crate::ast::params::{SortOrder, SortParams};
use crate::ast::{parse_params, TaskDescriptor};
use crate::error::Result;
use crate::eval::total_cmp;
use crate::store::{path, RecordStore, TaskOutput};

pub fn sort_records(input: &RecordStore, field: &str, order: SortOrder) -> RecordStore {
    let keys: Vec<_> = input.iter().map(|r| path::lookup(r, field)).collect();
    let mut positions: Vec<usize> = (0..input.len()).collect();

    // slice::sort_by is stable, so reversing the comparator keeps ties in input order
    positions.sort_by(|&a, &b| {
        let ord = total_cmp(keys[a], keys[b]);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    positions
        .into_iter()
        .filter_map(|i| input.get(i).cloned())
        .collect()
}

pub struct SortResolver;

#[async_trait]
impl TaskResolver for SortResolver {
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        parse_params::<SortParams>(task).map(|_| ())
    }

    #[instrument(name = "sort", skip_all, fields(records_in = input.len()))]
    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        _ctx: &TaskContext,
    ) -> Result<TaskOutput> {
        let params: SortParams = parse_params(task)?;
        Ok(TaskOutput::Records(sort_records(
            input,
            &params.operation.field,
            params.operation.order,
        )))
    }
}
