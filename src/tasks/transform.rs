//! Field mapping
//!
//! `project` (default): each output record holds exactly the mapping's
//! fields, in mapping order. `merge`: input fields are kept, mapped fields
//! are added, and the sources of plain renames are dropped (unless the
//! source is itself a mapping target).

use std::borrow::Cow;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use super::{TaskContext, TaskResolver};
use crate::ast::params::{ConcatPart, MappingExpr, TransformMode, TransformParams};
use crate::ast::{parse_params, TaskDescriptor};
use crate::error::{AionError, Result};
use crate::store::{display_value, path, Record, RecordStore, TaskOutput};

/// Evaluate one expression against the input record
pub fn eval_expr(expr: &MappingExpr, record: &Record) -> Value {
    match expr {
        MappingExpr::Copy(source) | MappingExpr::Field(source) => {
            path::lookup(record, source).cloned().unwrap_or(Value::Null)
        }
        MappingExpr::Literal(value) => value.clone(),
        MappingExpr::Concat(parts) => {
            let mut text = String::new();
            for part in parts {
                let piece: Cow<'_, str> = match part {
                    ConcatPart::Field(field) => path::lookup(record, field)
                        .map(display_value)
                        .unwrap_or(Cow::Borrowed("")),
                    ConcatPart::Literal(literal) => Cow::Borrowed(literal),
                    ConcatPart::FieldOrLiteral(name) => match record.get(name) {
                        Some(value) => display_value(value),
                        None => Cow::Borrowed(name),
                    },
                };
                text.push_str(&piece);
            }
            Value::String(text)
        }
    }
}

pub fn transform_record(record: &Record, params: &TransformParams) -> Record {
    match params.mode {
        TransformMode::Project => params
            .mapping
            .iter()
            .map(|(target, expr)| (target.clone(), eval_expr(expr, record)))
            .collect(),
        TransformMode::Merge => {
            let mut out = record.clone();
            for (_, expr) in params.mapping.iter() {
                if let MappingExpr::Copy(source) = expr {
                    if !params.mapping.contains_key(source) {
                        out.remove(source);
                    }
                }
            }
            for (target, expr) in params.mapping.iter() {
                out.insert(target.clone(), eval_expr(expr, record));
            }
            out
        }
    }
}

pub fn transform_records(input: &RecordStore, params: &TransformParams) -> RecordStore {
    input
        .iter()
        .map(|record| transform_record(record, params))
        .collect()
}

pub struct TransformResolver;

impl TransformResolver {
    fn params(task: &TaskDescriptor) -> Result<TransformParams> {
        let params: TransformParams = parse_params(task)?;
        if params.mapping.is_empty() {
            return Err(AionError::validation("transform", "'mapping' cannot be empty"));
        }
        Ok(params)
    }
}

#[async_trait]
impl TaskResolver for TransformResolver {
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        Self::params(task).map(|_| ())
    }

    #[instrument(name = "transform", skip_all, fields(records_in = input.len()))]
    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        _ctx: &TaskContext,
    ) -> Result<TaskOutput> {
        let params = Self::params(task)?;
        Ok(TaskOutput::Records(transform_records(input, &params)))
    }
}
