//! Field paths into records
//!
//! Supports:
//! - `name` (top-level field, matched verbatim first)
//! - `address.city` (dot notation into nested records)
//! - `tags[0]` / `tags.0` (list index)
//! - `$.a.b` (optional `$.` prefix)
//!
//! No filters, wildcards or slices.

use serde_json::Value;

use super::record::Record;

/// A parsed path segment
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Object field access: .field
    Field(String),
    /// List index access: [0]
    Index(usize),
}

/// Parse a field path into segments
///
/// Returns `None` for unsupported syntax (empty segments, malformed brackets).
pub fn parse(path: &str) -> Option<Vec<Segment>> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(vec![]);
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }

        if let Some(bracket_pos) = part.find('[') {
            let field = &part[..bracket_pos];
            if !field.is_empty() {
                segments.push(Segment::Field(field.to_string()));
            }
            // Chained indices: matrix[0][1]
            let mut rest = &part[bracket_pos..];
            while !rest.is_empty() {
                let close = rest.find(']')?;
                if !rest.starts_with('[') {
                    return None;
                }
                let index: usize = rest[1..close].parse().ok()?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
            }
        } else if let Ok(index) = part.parse::<usize>() {
            segments.push(Segment::Index(index));
        } else {
            segments.push(Segment::Field(part.to_string()));
        }
    }

    Some(segments)
}

/// Apply segments to a value, borrowing the result
pub fn apply<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match segment {
            Segment::Field(name) => current.get(name)?,
            Segment::Index(idx) => current.get(*idx)?,
        };
    }
    Some(current)
}

/// Look up a field in a record.
///
/// A key that exists verbatim wins over path interpretation, so fields whose
/// names contain dots stay addressable.
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    if !path.contains('.') && !path.contains('[') {
        return None;
    }

    let segments = parse(path)?;
    let (first, rest) = segments.split_first()?;
    let root = match first {
        Segment::Field(name) => record.get(name)?,
        Segment::Index(_) => return None,
    };
    apply(root, rest)
}
