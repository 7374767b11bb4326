//! Kind-specific task parameters
//!
//! Each built-in kind parses its `TaskDescriptor::params` into one of these
//! structs. Unknown keys are rejected (`deny_unknown_fields`) and any parse
//! failure becomes `AionError::Validation` for that kind.

use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::pipeline::TaskDescriptor;
use crate::error::{AionError, Result};
use crate::eval::compare::type_name;
use crate::eval::Condition;

/// Parameter struct bound to a task kind
pub trait TaskParams: DeserializeOwned {
    const KIND: &'static str;
}

/// Parse a descriptor's params for kind `P::KIND`
pub fn parse_params<P: TaskParams>(task: &TaskDescriptor) -> Result<P> {
    serde_json::from_value(Value::Object(task.params.clone()))
        .map_err(|e| AionError::validation(P::KIND, e.to_string()))
}

/// A single value or a list of them (`"age"` or `["age", "city"]`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(vs) => vs,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(vs) => vs,
        }
    }
}

// ═══════════════════════════════════════════
// FILTER
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterParams {
    pub condition: Condition,
}

impl TaskParams for FilterParams {
    const KIND: &'static str = "filter";
}

// ═══════════════════════════════════════════
// SORT
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortParams {
    pub operation: SortOperation,
}

impl TaskParams for SortParams {
    const KIND: &'static str = "sort";
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortOperation {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "ascending",
            Self::Desc => "descending",
        })
    }
}

// ═══════════════════════════════════════════
// TRANSFORM
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformParams {
    /// Output field → expression, in output order
    pub mapping: IndexMap<String, MappingExpr>,
    #[serde(default)]
    pub mode: TransformMode,
}

impl TaskParams for TransformParams {
    const KIND: &'static str = "transform";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Output records hold exactly the mapped fields
    #[default]
    Project,
    /// Keep input fields, add mapped ones, drop sources of plain renames
    Merge,
}

/// Right-hand side of a mapping entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum MappingExpr {
    /// `"source"`: copy a field (a plain rename)
    Copy(String),
    /// `{"field": "a.b"}`
    Field(String),
    /// `{"concat": [...]}`
    Concat(Vec<ConcatPart>),
    /// `{"literal": v}` or a bare number/bool/null
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPart {
    /// `{"field": f}`
    Field(String),
    /// `{"literal": s}`, or a number/bool rendered as text
    Literal(String),
    /// Bare string: field reference when the record has it, literal otherwise
    FieldOrLiteral(String),
}

impl TryFrom<Value> for MappingExpr {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(source) => Ok(Self::Copy(source)),
            Value::Number(_) | Value::Bool(_) | Value::Null => Ok(Self::Literal(value)),
            Value::Object(map) if map.len() == 1 => {
                let (key, inner) = map.into_iter().next().ok_or("empty mapping expression")?;
                match (key.as_str(), inner) {
                    ("field", Value::String(path)) => Ok(Self::Field(path)),
                    ("field", other) => Err(format!(
                        "'field' expects a string, got {}",
                        type_name(&other)
                    )),
                    ("literal", v) => Ok(Self::Literal(v)),
                    ("concat", Value::Array(parts)) => parts
                        .into_iter()
                        .map(ConcatPart::try_from)
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map(Self::Concat),
                    ("concat", other) => Err(format!(
                        "'concat' expects a list, got {}",
                        type_name(&other)
                    )),
                    (other, _) => Err(format!("unknown mapping expression '{}'", other)),
                }
            }
            Value::Object(map) => Err(format!(
                "mapping expression must have exactly one key (field, literal or concat), got {}",
                map.len()
            )),
            Value::Array(_) => {
                Err("mapping expression cannot be a list (use {\"concat\": [...]})".to_string())
            }
        }
    }
}

impl TryFrom<Value> for ConcatPart {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(Self::FieldOrLiteral(s)),
            Value::Number(n) => Ok(Self::Literal(n.to_string())),
            Value::Bool(b) => Ok(Self::Literal(b.to_string())),
            Value::Object(mut map) if map.len() == 1 => {
                if let Some(v) = map.remove("field") {
                    return match v {
                        Value::String(f) => Ok(Self::Field(f)),
                        other => Err(format!("concat 'field' expects a string, got {}", type_name(&other))),
                    };
                }
                match map.remove("literal") {
                    Some(Value::String(s)) => Ok(Self::Literal(s)),
                    Some(other @ (Value::Number(_) | Value::Bool(_))) => {
                        Ok(Self::Literal(other.to_string()))
                    }
                    Some(other) => Err(format!(
                        "concat 'literal' expects a scalar, got {}",
                        type_name(&other)
                    )),
                    None => Err("concat part must be {\"field\": ..} or {\"literal\": ..}".to_string()),
                }
            }
            other => Err(format!("invalid concat part of type {}", type_name(&other))),
        }
    }
}

// ═══════════════════════════════════════════
// AGGREGATE
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateParams {
    /// Grouping fields; empty means one global group
    #[serde(default)]
    pub group_by: OneOrMany<String>,
    /// Source field → function name(s)
    #[serde(default)]
    pub aggregations: IndexMap<String, OneOrMany<String>>,
}

impl TaskParams for AggregateParams {
    const KIND: &'static str = "aggregate";
}

// ═══════════════════════════════════════════
// MODEL CALL
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelCallParams {
    /// Template; `{{field}}` and `{{memory.key}}` are substituted per record
    pub prompt: String,
    /// Field whose value is passed as the model input
    #[serde(default)]
    pub input_field: Option<String>,
    #[serde(default = "default_output_field")]
    pub output_field: String,
    /// Provider name (engine default when absent)
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Max in-flight provider calls (engine default when absent)
    #[serde(default)]
    pub concurrency: Option<usize>,
}

fn default_output_field() -> String {
    "model_output".to_string()
}

impl TaskParams for ModelCallParams {
    const KIND: &'static str = "model_call";
}

// ═══════════════════════════════════════════
// EXPORT
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportParams {
    pub file_path: String,
    #[serde(default)]
    pub format: ExportFormat,
}

impl TaskParams for ExportParams {
    const KIND: &'static str = "export";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl TryFrom<String> for ExportFormat {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.eq_ignore_ascii_case("csv") {
            Ok(Self::Csv)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(format!("unsupported export format '{}' (expected csv or json)", s))
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
        })
    }
}

// ═══════════════════════════════════════════
// MEMORY
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryParams {
    pub operation: MemoryOperation,
    pub key: String,
}

impl TaskParams for MemoryParams {
    const KIND: &'static str = "memory";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryOperation {
    Write,
    Read,
}
