//! Records and immutable record store versions
//!
//! A `RecordStore` is never mutated: each task produces a new version.
//! Versions share their backing `Vec` through an `Arc`, so handing the
//! current version to a resolver (and to the execution log) is O(1).

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::path;

/// One row: field name → value, in insertion order
pub type Record = Map<String, Value>;

/// Ordered, immutable collection of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Arc<Vec<Record>>,
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Convert an arbitrary JSON value into records.
    ///
    /// - object → one record
    /// - array → one record per element (non-objects wrapped as `{"value": v}`)
    /// - null → empty store
    /// - any other scalar → `[{"value": v}]`
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::empty(),
            Value::Object(map) => Self::new(vec![map]),
            Value::Array(items) => items.into_iter().map(into_record).collect(),
            scalar => Self::new(vec![into_record(scalar)]),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    /// Take the records out (clones only if this version is shared)
    pub fn into_vec(self) -> Vec<Record> {
        Arc::try_unwrap(self.records).unwrap_or_else(|shared| (*shared).clone())
    }

    /// Whether two handles point at the same version
    pub fn same_version(&self, other: &RecordStore) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }

    /// Field vocabulary in first-seen order
    pub fn fields(&self) -> Vec<String> {
        let mut seen = indexmap::IndexSet::new();
        for record in self.records.iter() {
            for key in record.keys() {
                if !seen.contains(key.as_str()) {
                    seen.insert(key.clone());
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Values of one field across records (`None` where absent)
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.records.iter().map(move |r| path::lookup(r, field))
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.records
                .iter()
                .map(|r| Value::Object(r.clone()))
                .collect(),
        )
    }
}

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut record = Record::new();
            record.insert("value".to_string(), other);
            record
        }
    }
}

impl FromIterator<Record> for RecordStore {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<Record>> for RecordStore {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for RecordStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Record>::deserialize(deserializer).map(Self::new)
    }
}

/// What a task hands to the next one
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Records(RecordStore),
    Value(Value),
}

impl TaskOutput {
    /// Records view for chaining (scalars converted via `RecordStore::from_value`)
    pub fn to_records(&self) -> RecordStore {
        match self {
            Self::Records(store) => store.clone(),
            Self::Value(value) => RecordStore::from_value(value.clone()),
        }
    }

    pub fn as_records(&self) -> Option<&RecordStore> {
        match self {
            Self::Records(store) => Some(store),
            Self::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Records(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Records(store) => store.to_value(),
            Self::Value(value) => value.clone(),
        }
    }
}

impl From<RecordStore> for TaskOutput {
    fn from(store: RecordStore) -> Self {
        Self::Records(store)
    }
}

/// Text form of a value as used by concat, prompts and CSV cells.
///
/// Strings are raw (no quotes), null is empty, numbers use JSON formatting,
/// lists and objects are compact JSON.
pub fn display_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Null => Cow::Borrowed(""),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        other => Cow::Owned(other.to_string()),
    }
}
