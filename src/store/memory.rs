//! Run-scoped shared memory
//!
//! Seeded from the initial context, visible to every task through
//! `TaskContext`, snapshotted into the run report. Writes are serialized
//! behind a `parking_lot::RwLock`; readers never block each other.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{AionError, Result};

#[derive(Debug, Clone, Default)]
pub struct Memory {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(seed: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(seed)),
        }
    }

    /// Clone of the value under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Like `get`, but a missing key is an error
    pub fn require(&self, key: &str) -> Result<Value> {
        self.get(key).ok_or_else(|| AionError::MemoryKeyNotFound {
            key: key.to_string(),
        })
    }

    /// Insert or replace; returns the previous value
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.write().insert(key.into(), value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Point-in-time copy of every entry
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_state() {
        let memory = Memory::new();
        let other = memory.clone();
        memory.set("threshold", json!(10));
        assert_eq!(other.get("threshold"), Some(json!(10)));
        assert!(other.contains("threshold"));
    }

    #[test]
    fn set_returns_previous_value() {
        let memory = Memory::new();
        assert_eq!(memory.set("k", json!(1)), None);
        assert_eq!(memory.set("k", json!(2)), Some(json!(1)));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn require_reports_missing_key() {
        let memory = Memory::new();
        let err = memory.require("nope").unwrap_err();
        assert!(matches!(err, AionError::MemoryKeyNotFound { ref key } if key == "nope"));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut seed = Map::new();
        seed.insert("a".into(), json!(1));
        let memory = Memory::from_map(seed);
        let snap = memory.snapshot();
        memory.set("b", json!(2));
        assert_eq!(snap.len(), 1);
        assert_eq!(memory.keys(), vec!["a", "b"]);
    }
}
