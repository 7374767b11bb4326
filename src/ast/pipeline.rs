//! Pipeline document types
//!
//! - `PipelineDocument`: root `{pipeline: [...]}` plus optional name/description
//! - `TaskDescriptor`: kind, common fields, and the kind-specific params map
//! - `FailurePolicy`: abort | skip | retry
//!
//! Unknown top-level keys and every non-common task key are preserved, so a
//! document survives parse → serialize → parse unchanged.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema_validator::PipelineSchemaValidator;
use crate::error::{AionError, Result};

/// Root document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pipeline: Vec<TaskDescriptor>,
    /// Top-level keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of `pipeline`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Task kind, resolved through the registry
    pub task: String,
    /// Label used in logs and error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailurePolicy>,
    /// Consecutive independent tasks run concurrently on the same input
    #[serde(default, skip_serializing_if = "is_false")]
    pub independent: bool,
    /// Memory key that receives the task output after success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,
    /// Kind-specific parameters (checked by the resolver)
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// What the engine does when a task fails
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Skip,
    Retry(RetrySpec),
}

/// `{"retry": {...}}` parameters
///
/// `retries` counts re-invocations after the first attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySpec {
    pub retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

impl RetrySpec {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff_ms: default_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }

    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }
}

impl TaskDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            task: kind.into(),
            id: None,
            on_failure: None,
            independent: false,
            store_as: None,
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = Some(policy);
        self
    }

    pub fn independent(mut self) -> Self {
        self.independent = true;
        self
    }

    pub fn store_as(mut self, key: impl Into<String>) -> Self {
        self.store_as = Some(key.into());
        self
    }

    /// Effective policy (`abort` when unset)
    pub fn failure_policy(&self) -> FailurePolicy {
        self.on_failure.clone().unwrap_or_default()
    }

    /// `id` if set, otherwise the kind
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.task)
    }
}

impl PipelineDocument {
    pub fn new(pipeline: Vec<TaskDescriptor>) -> Self {
        Self {
            name: None,
            description: None,
            pipeline,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.pipeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipeline.is_empty()
    }

    /// Structural invariants for documents built in code (which skip the schema)
    pub fn check_structure(&self) -> Result<()> {
        if self.pipeline.is_empty() {
            return Err(AionError::MalformedPipeline {
                reason: "'pipeline' must contain at least one task".to_string(),
            });
        }
        if let Some(index) = self.pipeline.iter().position(|t| t.task.trim().is_empty()) {
            return Err(AionError::MalformedPipeline {
                reason: format!("task {} has an empty 'task' kind", index),
            });
        }
        for (index, task) in self.pipeline.iter().enumerate() {
            if let Some(FailurePolicy::Retry(spec)) = &task.on_failure {
                if !spec.multiplier.is_finite() || spec.multiplier < 1.0 {
                    return Err(AionError::MalformedPipeline {
                        reason: format!(
                            "task {}: retry multiplier must be a finite number >= 1, got {}",
                            index, spec.multiplier
                        ),
                    });
                }
                if spec.max_backoff_ms < spec.backoff_ms {
                    return Err(AionError::MalformedPipeline {
                        reason: format!(
                            "task {}: retry max_backoff_ms ({}) is below backoff_ms ({})",
                            index, spec.max_backoff_ms, spec.backoff_ms
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Parse an untyped document: schema check first, then typed parsing
    pub fn from_value(value: Value) -> Result<Self> {
        PipelineSchemaValidator::new()?.validate_value(&value)?;
        let doc: Self = serde_json::from_value(value).map_err(|e| AionError::MalformedPipeline {
            reason: e.to_string(),
        })?;
        doc.check_structure()?;
        Ok(doc)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| AionError::Parse {
            details: format!("JSON parse error: {}", e),
        })?;
        Self::from_value(value)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| AionError::Parse {
            details: format!("YAML parse error: {}", e),
        })?;
        Self::from_value(value)
    }

    /// Load from disk; `.yaml`/`.yml` are YAML, everything else JSON
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::from_yaml_str(&content)
            }
            _ => Self::from_json_str(&content),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| AionError::Parse {
            details: e.to_string(),
        })
    }

    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AionError::Parse {
            details: e.to_string(),
        })
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| AionError::Parse {
            details: e.to_string(),
        })
    }
}
