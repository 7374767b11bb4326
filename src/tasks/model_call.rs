//! Per-record model invocation
//!
//! For every record: substitute `{{field}}` / `{{memory.key}}` in the
//! prompt, call the provider with the `input_field` value, write the result
//! to `output_field`. Up to `concurrency` calls overlap; output order always
//! equals input order.

use futures::stream::{self, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, instrument};

use async_trait::async_trait;

use super::{TaskContext, TaskResolver};
use crate::ast::params::ModelCallParams;
use crate::ast::{parse_params, TaskDescriptor};
use crate::error::{AionError, Result};
use crate::provider::ProviderRegistry;
use crate::store::{display_value, path, Memory, Record, RecordStore, TaskOutput};

/// `{{ name }}` placeholders (whitespace inside braces allowed)
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\[\]$-]+)\s*\}\}").expect("placeholder regex is valid")
});

/// Substitute placeholders from the record (or memory for `memory.*`).
///
/// Unresolvable placeholders are left as written.
pub fn resolve_prompt(template: &str, record: &Record, memory: &Memory) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            let resolved = match name.strip_prefix("memory.") {
                Some(key) => memory.get(key).map(|v| display_value(&v).into_owned()),
                None => path::lookup(record, name).map(|v| display_value(v).into_owned()),
            };
            resolved.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub struct ModelCallResolver {
    providers: ProviderRegistry,
    default_provider: String,
    default_concurrency: usize,
}

impl ModelCallResolver {
    pub fn new(
        providers: ProviderRegistry,
        default_provider: impl Into<String>,
        default_concurrency: usize,
    ) -> Self {
        Self {
            providers,
            default_provider: default_provider.into(),
            default_concurrency: default_concurrency.max(1),
        }
    }

    fn params(&self, task: &TaskDescriptor) -> Result<ModelCallParams> {
        let params: ModelCallParams = parse_params(task)?;
        if params.concurrency == Some(0) {
            return Err(AionError::validation("model_call", "'concurrency' must be at least 1"));
        }
        if params.output_field.is_empty() {
            return Err(AionError::validation("model_call", "'output_field' cannot be empty"));
        }
        let provider = self.provider_name(&params);
        if !self.providers.contains(provider) {
            return Err(AionError::UnknownProvider {
                provider: provider.to_string(),
            });
        }
        Ok(params)
    }

    fn provider_name<'a>(&'a self, params: &'a ModelCallParams) -> &'a str {
        params.provider.as_deref().unwrap_or(&self.default_provider)
    }
}

#[async_trait]
impl TaskResolver for ModelCallResolver {
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        self.params(task).map(|_| ())
    }

    #[instrument(name = "model_call", skip_all, fields(records_in = input.len(), attempt = ctx.attempt))]
    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        ctx: &TaskContext,
    ) -> Result<TaskOutput> {
        let params = self.params(task)?;
        let provider = self.provider_name(&params);
        let concurrency = params.concurrency.unwrap_or(self.default_concurrency);
        debug!(provider, concurrency, "calling model provider");

        let params = &params;
        let outputs: Vec<Record> = stream::iter(input.iter())
            .map(|record| async move {
                let prompt = resolve_prompt(&params.prompt, record, &ctx.memory);
                let input_value = params
                    .input_field
                    .as_deref()
                    .and_then(|f| path::lookup(record, f))
                    .cloned()
                    .unwrap_or(Value::Null);
                let result = self
                    .providers
                    .infer(provider, &prompt, &input_value, params.model.as_deref())
                    .await?;
                let mut out = record.clone();
                out.insert(params.output_field.clone(), result);
                Ok::<_, AionError>(out)
            })
            .buffered(concurrency)
            .boxed()
            .try_collect()
            .await?;

        Ok(TaskOutput::Records(RecordStore::new(outputs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockProvider, MockReply};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver(providers: &ProviderRegistry) -> ModelCallResolver {
        ModelCallResolver::new(providers.clone(), "simulate", 4)
    }

    fn record(raw: Value) -> Record {
        match raw {
            Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    #[test]
    fn prompt_placeholders() {
        let memory = Memory::new();
        memory.set("tone", json!("formal"));
        let rec = record(json!({"name": "Ana", "address": {"city": "Lyon"}}));
        assert_eq!(
            resolve_prompt("Greet {{name}} from {{ address.city }} ({{memory.tone}}) {{missing}}", &rec, &memory),
            "Greet Ana from Lyon (formal) {{missing}}"
        );
    }

    #[tokio::test]
    async fn simulate_writes_output_field() {
        let providers = ProviderRegistry::new();
        let input = RecordStore::from_value(json!([{"text": "hello"}, {"other": 1}]));
        let task = TaskDescriptor::new("model_call")
            .with_param("prompt", json!("Summarize"))
            .with_param("input_field", json!("text"));

        let out = resolver(&providers)
            .execute(&input, &task, &TaskContext::detached(0))
            .await
            .unwrap()
            .to_records();

        assert_eq!(out.get(0).unwrap()["model_output"], json!("[AI: Summarize] hello"));
        assert_eq!(out.get(1).unwrap()["model_output"], json!("[AI: Summarize]"));
        assert_eq!(out.get(1).unwrap()["other"], json!(1));
    }

    #[tokio::test]
    async fn order_preserved_under_concurrency() {
        let providers = ProviderRegistry::new();
        let mock = Arc::new(MockProvider::new().with_delay(Duration::from_millis(5)).with_replies(
            (0..8).map(|i| MockReply::value(i)).collect(),
        ));
        providers.register(mock.clone());

        let input = RecordStore::from_value(json!((0..8).map(|i| json!({"i": i})).collect::<Vec<_>>()));
        let task = TaskDescriptor::new("model_call")
            .with_param("prompt", json!("n={{i}}"))
            .with_param("provider", json!("mock"))
            .with_param("output_field", json!("out"))
            .with_param("concurrency", json!(3));

        let out = resolver(&providers)
            .execute(&input, &task, &TaskContext::detached(0))
            .await
            .unwrap()
            .to_records();

        for (i, rec) in out.iter().enumerate() {
            assert_eq!(rec["i"], json!(i));
        }
        assert!(mock.max_in_flight() <= 3);
        let prompts: Vec<String> = mock.requests().into_iter().map(|r| r.prompt).collect();
        assert_eq!(prompts[0], "n=0");
    }

    #[tokio::test]
    async fn provider_failure_is_external_capability() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(MockProvider::new().failing_first(1, "503")));
        let task = TaskDescriptor::new("model_call")
            .with_param("prompt", json!("x"))
            .with_param("provider", json!("mock"));
        let err = resolver(&providers)
            .execute(
                &RecordStore::from_value(json!([{"a": 1}])),
                &task,
                &TaskContext::detached(0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AionError::ExternalCapability { .. }));
    }

    #[test]
    fn unknown_provider_fails_validation() {
        let providers = ProviderRegistry::new();
        let task = TaskDescriptor::new("model_call")
            .with_param("prompt", json!("x"))
            .with_param("provider", json!("nope"));
        let err = resolver(&providers).validate(&task).unwrap_err();
        assert!(matches!(err, AionError::UnknownProvider { .. }));
        assert!(err.is_document_defect());
    }
}
