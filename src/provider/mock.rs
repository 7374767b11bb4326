//! Mock provider for testing
//!
//! Returns scripted replies (or failures) without any real model.
//! Every request is recorded for assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{InferRequest, ModelProvider};

/// One scripted reply
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Value(Value),
    Failure(String),
}

impl MockReply {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }
}

/// Provider that replays a queue of replies
pub struct MockProvider {
    name: String,
    /// Queue of replies to return (FIFO)
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    /// Reply when the queue is empty
    default_reply: MockReply,
    /// All requests made (for assertions)
    requests: Arc<Mutex<Vec<InferRequest>>>,
    /// Artificial latency per call
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Mock named "mock" that answers "Mock response"
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            default_reply: MockReply::value("Mock response"),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue replies, returned in order before the default kicks in
    pub fn with_replies(self, replies: Vec<MockReply>) -> Self {
        self.replies.lock().extend(replies);
        self
    }

    /// Fail the first `n` calls, then use the default reply
    pub fn failing_first(self, n: usize, reason: &str) -> Self {
        self.with_replies(vec![MockReply::failure(reason); n])
    }

    pub fn with_default(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<InferRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<InferRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Highest number of calls that were in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&self, request: &InferRequest) -> anyhow::Result<Value> {
        self.requests.lock().push(request.clone());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Value(value) => Ok(value),
            MockReply::Failure(reason) => Err(anyhow::anyhow!(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn default_reply() {
        let provider = MockProvider::new();
        let out = provider
            .infer(&InferRequest::new("Hello", Value::Null))
            .await
            .unwrap();
        assert_eq!(out, json!("Mock response"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn queued_replies_then_default() {
        let provider = MockProvider::new()
            .with_replies(vec![MockReply::value(1), MockReply::failure("boom")])
            .with_default(MockReply::value("done"));

        let req = InferRequest::new("p", Value::Null);
        assert_eq!(provider.infer(&req).await.unwrap(), json!(1));
        assert!(provider.infer(&req).await.is_err());
        assert_eq!(provider.infer(&req).await.unwrap(), json!("done"));
    }

    #[tokio::test]
    async fn records_requests() {
        let provider = MockProvider::new().failing_first(1, "flaky");
        let req = InferRequest::new("Summarize", json!("text")).with_model(Some("m1".into()));
        let _ = provider.infer(&req).await;
        assert_eq!(provider.last_request(), Some(req));
    }
}
