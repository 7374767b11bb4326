//! Task registry - kind string → resolver
//!
//! Exact string match on the descriptor's `task` field. Registering a kind
//! twice replaces the earlier resolver (logged at debug level).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{AionError, Result};
use crate::tasks::TaskResolver;

#[derive(Clone, Default)]
pub struct TaskRegistry {
    resolvers: HashMap<String, Arc<dyn TaskResolver>>,
}

impl TaskRegistry {
    /// Empty registry (no built-in kinds)
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver; returns the one it replaced, if any
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        resolver: Arc<dyn TaskResolver>,
    ) -> Option<Arc<dyn TaskResolver>> {
        let kind = kind.into();
        let previous = self.resolvers.insert(kind.clone(), resolver);
        if previous.is_some() {
            debug!(kind = %kind, "replaced registered task resolver");
        }
        previous
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn TaskResolver>> {
        self.resolvers.get(kind).cloned()
    }

    /// Like `get`, but an unregistered kind is an error
    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn TaskResolver>> {
        self.get(kind).ok_or_else(|| AionError::UnknownTaskKind {
            kind: kind.to_string(),
        })
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.resolvers.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.resolvers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TaskDescriptor;
    use crate::store::{RecordStore, TaskOutput};
    use crate::tasks::TaskContext;
    use async_trait::async_trait;
    use serde_json::json;

    struct Constant(i64);

    #[async_trait]
    impl TaskResolver for Constant {
        async fn execute(
            &self,
            _input: &RecordStore,
            _task: &TaskDescriptor,
            _ctx: &TaskContext,
        ) -> Result<TaskOutput> {
            Ok(TaskOutput::Value(json!(self.0)))
        }
    }

    #[test]
    fn unknown_kind() {
        let registry = TaskRegistry::new();
        let err = registry.resolve("teleport").err().unwrap();
        assert!(matches!(err, AionError::UnknownTaskKind { ref kind } if kind == "teleport"));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut registry = TaskRegistry::new();
        assert!(registry.register("const", Arc::new(Constant(1))).is_none());
        assert!(registry.register("const", Arc::new(Constant(2))).is_some());
        assert_eq!(registry.len(), 1);

        let resolver = registry.resolve("const").unwrap();
        let out = resolver
            .execute(
                &RecordStore::empty(),
                &TaskDescriptor::new("const"),
                &TaskContext::detached(0),
            )
            .await
            .unwrap();
        assert_eq!(out, TaskOutput::Value(json!(2)));
    }

    #[test]
    fn kinds_are_exact_and_sorted() {
        let mut registry = TaskRegistry::new();
        registry.register("b", Arc::new(Constant(0)));
        registry.register("a", Arc::new(Constant(0)));
        assert_eq!(registry.kinds(), vec!["a", "b"]);
        assert!(!registry.contains("A"));
    }
}
