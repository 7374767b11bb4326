//! Pipeline schema validator
//!
//! Checks raw JSON/YAML documents against the embedded pipeline schema
//! before serde parsing, so structural defects surface as one
//! `MalformedPipeline` error listing every offending location.

use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::AionError;

/// Embedded schema JSON (compiled at build time)
const SCHEMA_JSON: &str = include_str!("../../schemas/pipeline.schema.json");

/// Global compiled schema (lazy initialization)
static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

/// One schema violation
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIssue {
    /// JSON pointer to the offending value (e.g. "/pipeline/0/task")
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

pub struct PipelineSchemaValidator {
    validator: &'static Validator,
}

impl PipelineSchemaValidator {
    /// Uses a cached global validator
    pub fn new() -> Result<Self, AionError> {
        let compiled = VALIDATOR.get_or_init(|| {
            let schema: Value = serde_json::from_str(SCHEMA_JSON)
                .map_err(|e| format!("Failed to parse schema JSON: {}", e))?;
            Validator::new(&schema).map_err(|e| format!("Failed to compile schema: {}", e))
        });

        match compiled {
            Ok(validator) => Ok(Self { validator }),
            Err(e) => Err(AionError::Config { reason: e.clone() }),
        }
    }

    /// Every violation in document order
    pub fn issues(&self, value: &Value) -> Vec<SchemaIssue> {
        self.validator
            .iter_errors(value)
            .map(|e| SchemaIssue {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    pub fn validate_value(&self, value: &Value) -> Result<(), AionError> {
        let issues = self.issues(value);
        if issues.is_empty() {
            return Ok(());
        }
        let reason = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(AionError::MalformedPipeline { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validator_creation_succeeds() {
        assert!(PipelineSchemaValidator::new().is_ok());
    }

    #[test]
    fn minimal_document_passes() {
        let validator = PipelineSchemaValidator::new().unwrap();
        assert!(validator
            .validate_value(&json!({"pipeline": [{"task": "sort"}]}))
            .is_ok());
    }

    #[test]
    fn issues_carry_paths() {
        let validator = PipelineSchemaValidator::new().unwrap();
        let issues = validator.issues(&json!({"pipeline": [{"task": ""}, {"task": 3}]}));
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].path, "/pipeline/0/task");
        assert_eq!(issues[1].path, "/pipeline/1/task");
    }

    #[test]
    fn retry_spec_rejects_unknown_keys() {
        let validator = PipelineSchemaValidator::new().unwrap();
        let doc = json!({"pipeline": [
            {"task": "sort", "on_failure": {"retry": {"retries": 1, "jitter": 0.5}}}
        ]});
        assert!(validator.validate_value(&doc).is_err());
    }
}
