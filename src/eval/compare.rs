//! Value comparison rules shared by filter, sort and aggregate
//!
//! Three relations live here:
//! - `loose_eq`: tolerant equality used by `==`, `!=`, `in`, `contains`
//! - `ordered_cmp`: partial order for `>`/`<` (number/number, string/string only)
//! - `total_cmp`: total order used by sort, grouping, min/max

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// JSON type name for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn number_eq(a: &Number, b: &Number) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn number_cmp(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    x.total_cmp(&y)
}

fn string_matches_number(s: &str, n: &Number) -> bool {
    match s.trim().parse::<f64>() {
        Ok(parsed) => n.as_f64().is_some_and(|f| f == parsed),
        Err(_) => false,
    }
}

fn string_matches_bool(s: &str, b: bool) -> bool {
    s.trim()
        .eq_ignore_ascii_case(if b { "true" } else { "false" })
}

/// Tolerant equality.
///
/// Numeric strings equal the number they parse to, `"true"`/`"false"`
/// (any case) equal the booleans, null equals null. Lists compare
/// element-wise with the same rules. Every other cross-type pair is unequal.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Number(x), Value::Number(y)) => number_eq(x, y),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            string_matches_number(s, n)
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            string_matches_bool(s, *b)
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loose_eq(x, y))
        }
        _ => a == b,
    }
}

/// Ordering for the comparison operators: numbers against numbers, strings
/// against strings, `None` for everything else.
pub fn ordered_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Some(number_cmp(x, y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over optional values.
///
/// missing = null < bool < number < string < list < object
pub fn total_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_rank = rank(a).cmp(&rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => number_cmp(x, y),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Array(xs)), Some(Value::Array(ys))) => {
            for (x, y) in xs.iter().zip(ys) {
                let ord = total_cmp(Some(x), Some(y));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        (Some(Value::Object(x)), Some(Value::Object(y))) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y) {
                let ord = kx.cmp(ky).then_with(|| total_cmp(Some(vx), Some(vy)));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_string_equals_number() {
        assert!(loose_eq(&json!("5"), &json!(5)));
        assert!(loose_eq(&json!(5), &json!("5.0")));
        assert!(!loose_eq(&json!("five"), &json!(5)));
    }

    #[test]
    fn int_and_float_compare_equal() {
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert_eq!(ordered_cmp(&json!(2), &json!(1.5)), Some(Ordering::Greater));
    }

    #[test]
    fn bool_strings() {
        assert!(loose_eq(&json!("TRUE"), &json!(true)));
        assert!(loose_eq(&json!(false), &json!("false")));
        assert!(!loose_eq(&json!("yes"), &json!(true)));
    }

    #[test]
    fn null_only_equals_null() {
        assert!(loose_eq(&json!(null), &json!(null)));
        assert!(!loose_eq(&json!(null), &json!(0)));
        assert!(!loose_eq(&json!(""), &json!(null)));
    }

    #[test]
    fn ordering_requires_same_kind() {
        assert_eq!(ordered_cmp(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(ordered_cmp(&json!("10"), &json!(5)), None);
        assert_eq!(ordered_cmp(&json!(true), &json!(false)), None);
    }

    #[test]
    fn total_order_ranks_types() {
        let ordered = [
            None,
            Some(json!(false)),
            Some(json!(-3)),
            Some(json!(2.5)),
            Some(json!("a")),
            Some(json!([1])),
            Some(json!({"k": 1})),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(
                total_cmp(pair[0].as_ref(), pair[1].as_ref()),
                Ordering::Less,
                "{:?} < {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(total_cmp(None, Some(&json!(null))), Ordering::Equal);
    }
}
