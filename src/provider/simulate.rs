//! Deterministic in-process provider
//!
//! Output: `"[AI: <prompt>] <input>"`, or `"[AI: <prompt>]"` when the input
//! is null.

use async_trait::async_trait;
use serde_json::Value;

use super::{InferRequest, ModelProvider};
use crate::store::display_value;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulateProvider;

impl SimulateProvider {
    pub fn render(prompt: &str, input: &Value) -> String {
        if input.is_null() {
            format!("[AI: {}]", prompt)
        } else {
            format!("[AI: {}] {}", prompt, display_value(input))
        }
    }
}

#[async_trait]
impl ModelProvider for SimulateProvider {
    fn name(&self) -> &str {
        "simulate"
    }

    async fn infer(&self, request: &InferRequest) -> anyhow::Result<Value> {
        Ok(Value::String(Self::render(&request.prompt, &request.input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_with_and_without_input() {
        assert_eq!(SimulateProvider::render("Tag", &json!("x")), "[AI: Tag] x");
        assert_eq!(SimulateProvider::render("Tag", &json!(3)), "[AI: Tag] 3");
        assert_eq!(SimulateProvider::render("Tag", &Value::Null), "[AI: Tag]");
    }
}
