//! Human-readable pipeline explanation

use std::fmt::Write;

use super::params::{
    parse_params, AggregateParams, ExportParams, FilterParams, MemoryOperation, MemoryParams,
    ModelCallParams, SortParams, TransformMode, TransformParams,
};
use super::pipeline::{FailurePolicy, PipelineDocument, TaskDescriptor};
use crate::error::Result;

const PROMPT_PREVIEW_CHARS: usize = 50;

/// Describe every task of a document in plain language.
///
/// Never fails: tasks whose parameters do not parse are described as such.
pub fn explain(doc: &PipelineDocument) -> String {
    let mut out = String::new();
    if let Some(name) = &doc.name {
        let _ = writeln!(out, "# {}\n", name);
    }
    let count = doc.pipeline.len();
    let _ = writeln!(
        out,
        "This pipeline contains {} task{}:\n",
        count,
        if count == 1 { "" } else { "s" }
    );

    for (i, task) in doc.pipeline.iter().enumerate() {
        let _ = write!(out, "{}. **{}** task", i + 1, task.task.to_uppercase());
        if let Some(id) = &task.id {
            let _ = write!(out, " ({})", id);
        }
        out.push('\n');

        match describe(task) {
            Ok(Some(line)) => {
                let _ = writeln!(out, "   - {}", line);
            }
            Ok(None) => {
                let keys: Vec<&str> = task.params.keys().map(String::as_str).collect();
                if keys.is_empty() {
                    out.push_str("   - Custom task\n");
                } else {
                    let _ = writeln!(out, "   - Custom task with parameters: {}", keys.join(", "));
                }
            }
            Err(e) => {
                let _ = writeln!(out, "   - Invalid parameters: {}", e);
            }
        }

        if task.independent {
            out.push_str("   - Runs as an independent branch on the same input\n");
        }
        if let Some(key) = &task.store_as {
            let _ = writeln!(out, "   - Stores its output in memory as '{}'", key);
        }
        match &task.on_failure {
            Some(FailurePolicy::Skip) => out.push_str("   - On failure: skipped\n"),
            Some(FailurePolicy::Retry(spec)) => {
                let _ = writeln!(
                    out,
                    "   - On failure: retried up to {} time{}",
                    spec.retries,
                    if spec.retries == 1 { "" } else { "s" }
                );
            }
            Some(FailurePolicy::Abort) | None => {}
        }
        out.push('\n');
    }

    out
}

fn describe(task: &TaskDescriptor) -> Result<Option<String>> {
    let line = match task.task.as_str() {
        "filter" => {
            let p: FilterParams = parse_params(task)?;
            format!("Filters records where {}", p.condition)
        }
        "sort" => {
            let p: SortParams = parse_params(task)?;
            format!(
                "Sorts records by {} in {} order",
                p.operation.field, p.operation.order
            )
        }
        "transform" => {
            let p: TransformParams = parse_params(task)?;
            let fields: Vec<&str> = p.mapping.keys().map(String::as_str).collect();
            match p.mode {
                TransformMode::Project => format!("Transforms fields: {}", fields.join(", ")),
                TransformMode::Merge => format!(
                    "Adds or renames fields: {} (other fields kept)",
                    fields.join(", ")
                ),
            }
        }
        "aggregate" => {
            let p: AggregateParams = parse_params(task)?;
            let computed: Vec<String> = p
                .aggregations
                .iter()
                .map(|(field, funcs)| format!("{} ({})", field, funcs.as_slice().join(", ")))
                .collect();
            let groups = p.group_by.as_slice();
            if groups.is_empty() {
                format!("Aggregates all records: {}", computed.join(", "))
            } else {
                format!(
                    "Groups by {} and computes: {}",
                    groups.join(", "),
                    computed.join(", ")
                )
            }
        }
        "model_call" => {
            let p: ModelCallParams = parse_params(task)?;
            let preview: String = p.prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
            let ellipsis = if p.prompt.chars().count() > PROMPT_PREVIEW_CHARS {
                "..."
            } else {
                ""
            };
            let provider = p.provider.as_deref().unwrap_or("default");
            format!(
                "Calls model provider '{}' with prompt: {}{} (result in '{}')",
                provider, preview, ellipsis, p.output_field
            )
        }
        "export" => {
            let p: ExportParams = parse_params(task)?;
            format!("Exports records to {} as {}", p.file_path, p.format)
        }
        "memory" => {
            let p: MemoryParams = parse_params(task)?;
            match p.operation {
                MemoryOperation::Write => {
                    format!("Stores the current records in memory under '{}'", p.key)
                }
                MemoryOperation::Read => format!("Loads records from memory key '{}'", p.key),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explains_builtin_kinds() {
        let doc = PipelineDocument::from_value(json!({
            "pipeline": [
                {"task": "filter", "condition": {"field": "age", "operator": ">", "value": 25}},
                {"task": "sort", "operation": {"field": "age", "order": "desc"}},
                {"task": "transform", "mapping": {"name": "full_name", "age": "age"}},
                {"task": "export", "file_path": "out/adults.csv"}
            ]
        }))
        .unwrap();

        let text = explain(&doc);
        assert!(text.starts_with("This pipeline contains 4 tasks:\n\n"));
        assert!(text.contains("1. **FILTER** task\n   - Filters records where age > 25\n"));
        assert!(text.contains("Sorts records by age in descending order"));
        assert!(text.contains("Transforms fields: name, age"));
        assert!(text.contains("Exports records to out/adults.csv as CSV"));
    }

    #[test]
    fn truncates_long_prompts() {
        let prompt = "x".repeat(80);
        let doc = PipelineDocument::new(vec![
            TaskDescriptor::new("model_call").with_param("prompt", json!(prompt))
        ]);
        let text = explain(&doc);
        assert!(text.contains(&format!("{}...", "x".repeat(50))));
        assert!(text.starts_with("This pipeline contains 1 task:"));
    }

    #[test]
    fn custom_and_invalid_tasks() {
        let doc = PipelineDocument::new(vec![
            TaskDescriptor::new("geocode").with_param("address_field", json!("addr")),
            TaskDescriptor::new("sort").with_id("broken"),
        ]);
        let text = explain(&doc);
        assert!(text.contains("**GEOCODE** task\n   - Custom task with parameters: address_field"));
        assert!(text.contains("**SORT** task (broken)\n   - Invalid parameters:"));
    }
}
