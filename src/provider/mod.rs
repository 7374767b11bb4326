//! Model capability - providers behind `model_call`
//!
//! - [`ModelProvider`]: async trait every provider implements
//! - [`ProviderRegistry`]: name → provider, `simulate` always present
//! - [`SimulateProvider`]: deterministic in-process provider
//! - [`MockProvider`]: scripted replies and failures, records requests
//!
//! Providers return `anyhow::Result`; the registry maps failures into
//! `AionError::ExternalCapability` so the failure policy can retry them.
//!
//! ```rust,ignore
//! let providers = ProviderRegistry::new();
//! let out = providers.infer("simulate", "Summarize", &json!("text"), None).await?;
//! assert_eq!(out, json!("[AI: Summarize] text"));
//! ```

mod mock;
mod simulate;

pub use mock::{MockProvider, MockReply};
pub use simulate::SimulateProvider;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{AionError, Result};

/// One inference call
#[derive(Debug, Clone, PartialEq)]
pub struct InferRequest {
    /// Prompt with placeholders already resolved
    pub prompt: String,
    /// Input value (null when the task has no `input_field` or the field is absent)
    pub input: Value,
    pub model: Option<String>,
}

impl InferRequest {
    pub fn new(prompt: impl Into<String>, input: Value) -> Self {
        Self {
            prompt: prompt.into(),
            input,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Language-model capability used by `model_call`
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Registry name (e.g. "simulate", "mock")
    fn name(&self) -> &str;

    /// Produce a value for one record
    async fn infer(&self, request: &InferRequest) -> anyhow::Result<Value>;
}

/// Provider lookup by name
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<DashMap<String, Arc<dyn ModelProvider>>>,
}

impl ProviderRegistry {
    /// Registry holding only `simulate`
    pub fn new() -> Self {
        let registry = Self {
            providers: Arc::new(DashMap::new()),
        };
        registry.register(Arc::new(SimulateProvider));
        registry
    }

    /// Register under the provider's own name (last registration wins)
    pub fn register(&self, provider: Arc<dyn ModelProvider>) {
        let name = provider.name().to_string();
        self.register_as(name, provider);
    }

    /// Register under an explicit name (last registration wins)
    pub fn register_as(&self, name: impl Into<String>, provider: Arc<dyn ModelProvider>) {
        let name = name.into();
        if self.providers.insert(name.clone(), provider).is_some() {
            debug!(provider = %name, "replaced registered model provider");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ModelProvider>> {
        self.providers
            .get(name)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| AionError::UnknownProvider {
                provider: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// `infer(prompt, input)` on the named provider
    #[instrument(skip(self, prompt, input), fields(prompt_len = prompt.len()))]
    pub async fn infer(
        &self,
        provider: &str,
        prompt: &str,
        input: &Value,
        model: Option<&str>,
    ) -> Result<Value> {
        let backend = self.get(provider)?;
        let request = InferRequest::new(prompt, input.clone()).with_model(model.map(String::from));
        backend
            .infer(&request)
            .await
            .map_err(|e| AionError::ExternalCapability {
                capability: format!("model provider '{}'", provider),
                reason: format!("{:#}", e),
            })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn simulate_is_always_registered() {
        let providers = ProviderRegistry::new();
        assert!(providers.contains("simulate"));
        let out = providers
            .infer("simulate", "Summarize", &json!("hello"), None)
            .await
            .unwrap();
        assert_eq!(out, json!("[AI: Summarize] hello"));
    }

    #[tokio::test]
    async fn unknown_provider() {
        let providers = ProviderRegistry::new();
        let err = providers
            .infer("gpt-9", "x", &Value::Null, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AionError::UnknownProvider { ref provider } if provider == "gpt-9"));
        assert!(err.is_document_defect());
    }

    #[tokio::test]
    async fn provider_failure_is_external_capability() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(MockProvider::new().with_replies(vec![
            MockReply::failure("rate limited"),
        ])));
        let err = providers
            .infer("mock", "x", &Value::Null, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AionError::ExternalCapability { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn last_registration_wins() {
        let providers = ProviderRegistry::new();
        providers.register_as("simulate", Arc::new(MockProvider::new()));
        assert_eq!(providers.get("simulate").unwrap().name(), "mock");
        assert_eq!(providers.names(), vec!["simulate"]);
    }
}
