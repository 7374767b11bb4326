//! Filter conditions
//!
//! Wire format:
//! - leaf: `{"field": "age", "operator": ">", "value": 25}`
//! - composite: `{"all": [...]}`, `{"any": [...]}`, `{"not": {...}}`
//!
//! Conditions are checked when parsed (operator known, `in` value is a list,
//! `matches` pattern compiles), so evaluation itself cannot fail.

use std::fmt;
use std::str::FromStr;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::compare::{loose_eq, ordered_cmp, type_name};
use crate::store::{display_value, path, Record};

/// Patterns kept before the cache starts over
const REGEX_CACHE_CAPACITY: usize = 256;

/// Compiled `matches` patterns, keyed by source text
static REGEX_CACHE: Lazy<RegexCache> = Lazy::new(|| RegexCache::new(REGEX_CACHE_CAPACITY));

/// Bounded pattern cache; cleared wholesale when full
struct RegexCache {
    compiled: DashMap<String, Regex>,
    capacity: usize,
}

impl RegexCache {
    fn new(capacity: usize) -> Self {
        Self {
            compiled: DashMap::new(),
            capacity,
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        if let Some(re) = self.compiled.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)?;
        if self.compiled.len() >= self.capacity {
            self.compiled.clear();
        }
        self.compiled.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.compiled.len()
    }
}

/// Compile a pattern once and reuse it afterwards
pub fn cached_regex(pattern: &str) -> Result<Regex, regex::Error> {
    REGEX_CACHE.get_or_compile(pattern)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    IsNull,
    NotNull,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Ge,
        Self::Lt,
        Self::Le,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Matches,
        Self::IsNull,
        Self::NotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Matches => "matches",
            Self::IsNull => "is_null",
            Self::NotNull => "not_null",
        }
    }

    /// Operators that ignore the comparison value
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull)
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|op| op.as_str()).collect();
                format!("unsupported operator '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recursive predicate over one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Condition {
    Compare {
        field: String,
        operator: Operator,
        value: Value,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Leaf constructor (the value is not checked here)
    pub fn compare(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self::Compare {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Self::Compare {
                field,
                operator,
                value,
            } => compare(path::lookup(record, field), *operator, value),
            Self::All(children) => children.iter().all(|c| c.evaluate(record)),
            Self::Any(children) => children.iter().any(|c| c.evaluate(record)),
            Self::Not(inner) => !inner.evaluate(record),
        }
    }

    /// Every field the condition reads, in first-seen order
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
        }
    }
}

/// Apply one operator to a (possibly missing) field value
fn compare(actual: Option<&Value>, operator: Operator, expected: &Value) -> bool {
    let actual = match (actual, operator) {
        (None, Operator::IsNull) => return true,
        (None, _) => return false,
        (Some(v), _) => v,
    };

    match operator {
        Operator::IsNull => actual.is_null(),
        Operator::NotNull => !actual.is_null(),
        Operator::Eq => loose_eq(actual, expected),
        Operator::Ne => !loose_eq(actual, expected),
        Operator::Gt => ordered_cmp(actual, expected).is_some_and(|o| o.is_gt()),
        Operator::Ge => ordered_cmp(actual, expected).is_some_and(|o| o.is_ge()),
        Operator::Lt => ordered_cmp(actual, expected).is_some_and(|o| o.is_lt()),
        Operator::Le => ordered_cmp(actual, expected).is_some_and(|o| o.is_le()),
        Operator::In => member_of(actual, expected),
        Operator::NotIn => !member_of(actual, expected),
        Operator::Contains => match actual {
            Value::String(haystack) => match expected {
                Value::String(needle) => haystack.contains(needle.as_str()),
                Value::Number(_) | Value::Bool(_) => {
                    haystack.contains(display_value(expected).as_ref())
                }
                _ => false,
            },
            Value::Array(items) => items.iter().any(|item| loose_eq(item, expected)),
            Value::Object(map) => expected.as_str().is_some_and(|k| map.contains_key(k)),
            _ => false,
        },
        Operator::StartsWith => match (actual, expected) {
            (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        Operator::EndsWith => match (actual, expected) {
            (Value::String(s), Value::String(suffix)) => s.ends_with(suffix.as_str()),
            _ => false,
        },
        Operator::Matches => match (actual, expected) {
            (Value::String(s), Value::String(pattern)) => {
                cached_regex(pattern).is_ok_and(|re| re.is_match(s))
            }
            _ => false,
        },
    }
}

fn member_of(actual: &Value, list: &Value) -> bool {
    match list {
        Value::Array(items) => items.iter().any(|item| loose_eq(actual, item)),
        _ => false,
    }
}

// ═══════════════════════════════════════════
// WIRE FORMAT
// ═══════════════════════════════════════════

const COMPOSITE_KEYS: [&str; 3] = ["all", "any", "not"];

impl TryFrom<Value> for Condition {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "condition must be an object, got {}",
                    type_name(&other)
                ))
            }
        };

        if let Some(key) = COMPOSITE_KEYS.iter().find(|k| map.contains_key(**k)) {
            if map.len() != 1 {
                return Err(format!(
                    "composite condition '{}' cannot be combined with other keys",
                    key
                ));
            }
            return parse_composite(key, map);
        }

        parse_compare(map)
    }
}

fn parse_composite(key: &str, mut map: Map<String, Value>) -> Result<Condition, String> {
    let inner = map.remove(key).unwrap_or(Value::Null);
    if key == "not" {
        return Ok(Condition::Not(Box::new(Condition::try_from(inner)?)));
    }

    let items = match inner {
        Value::Array(items) if !items.is_empty() => items,
        Value::Array(_) => return Err(format!("'{}' needs at least one condition", key)),
        other => {
            return Err(format!(
                "'{}' must be a list of conditions, got {}",
                key,
                type_name(&other)
            ))
        }
    };
    let children = items
        .into_iter()
        .map(Condition::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(if key == "all" {
        Condition::All(children)
    } else {
        Condition::Any(children)
    })
}

fn parse_compare(mut map: Map<String, Value>) -> Result<Condition, String> {
    let field = match map.remove("field") {
        Some(Value::String(f)) if !f.is_empty() => f,
        Some(_) => return Err("condition 'field' must be a non-empty string".to_string()),
        None => return Err("condition is missing 'field'".to_string()),
    };
    let operator: Operator = match map.remove("operator") {
        Some(Value::String(op)) => op.parse()?,
        Some(_) => return Err("condition 'operator' must be a string".to_string()),
        None => return Err(format!("condition on '{}' is missing 'operator'", field)),
    };
    let value = match map.remove("value") {
        Some(v) => v,
        None if operator.is_unary() => Value::Null,
        None => return Err(format!("condition on '{}' is missing 'value'", field)),
    };
    if let Some(extra) = map.keys().next() {
        return Err(format!("unknown condition key '{}'", extra));
    }

    match operator {
        Operator::In | Operator::NotIn if !value.is_array() => {
            return Err(format!(
                "operator '{}' needs a list value, got {}",
                operator,
                type_name(&value)
            ))
        }
        Operator::Matches => {
            let pattern = value
                .as_str()
                .ok_or_else(|| "operator 'matches' needs a string pattern".to_string())?;
            cached_regex(pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
        }
        _ => {}
    }

    Ok(Condition::Compare {
        field,
        operator,
        value,
    })
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        let mut map = Map::new();
        match condition {
            Condition::Compare {
                field,
                operator,
                value,
            } => {
                map.insert("field".into(), Value::String(field));
                map.insert("operator".into(), Value::String(operator.as_str().into()));
                if !(operator.is_unary() && value.is_null()) {
                    map.insert("value".into(), value);
                }
            }
            Condition::All(children) => {
                map.insert("all".into(), children.into_iter().map(Value::from).collect());
            }
            Condition::Any(children) => {
                map.insert("any".into(), children.into_iter().map(Value::from).collect());
            }
            Condition::Not(inner) => {
                map.insert("not".into(), Value::from(*inner));
            }
        }
        Value::Object(map)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare {
                field, operator, ..
            } if operator.is_unary() => write!(f, "{} {}", field, operator),
            Self::Compare {
                field,
                operator,
                value,
            } => write!(f, "{} {} {}", field, operator, display_value(value)),
            Self::All(children) => write_joined(f, children, " and "),
            Self::Any(children) => write_joined(f, children, " or "),
            Self::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Condition], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", child)?;
    }
    f.write_str(")")
}
