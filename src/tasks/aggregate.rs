//! Group-by aggregation
//!
//! Records are partitioned by the tuple of their `group_by` values (a
//! missing field groups as null), so every input record lands in exactly
//! one group. Groups come out in ascending key order.
//!
//! Output field naming: `source` when the source has a single function,
//! `source_function` when it has several.

use std::cmp::Ordering;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Number, Value};
use tracing::instrument;

use super::{TaskContext, TaskResolver};
use crate::ast::params::AggregateParams;
use crate::ast::{parse_params, TaskDescriptor};
use crate::error::{AionError, Result};
use crate::eval::{loose_eq, total_cmp};
use crate::store::{path, Record, RecordStore, TaskOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunc {
    Count,
    CountDistinct,
    Sum,
    Mean,
    Median,
    Min,
    Max,
    First,
    Last,
}

impl AggFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
        }
    }

    /// Apply to the values of one group (`None` where the field is missing)
    pub fn apply(&self, values: &[Option<&Value>]) -> Value {
        let present = || values.iter().filter_map(|v| *v).filter(|v| !v.is_null());
        match self {
            Self::Count => Value::from(present().count()),
            Self::CountDistinct => {
                let mut distinct: Vec<&Value> = Vec::new();
                for v in present() {
                    if !distinct.iter().any(|d| loose_eq(d, v)) {
                        distinct.push(v);
                    }
                }
                Value::from(distinct.len())
            }
            Self::Sum => {
                let nums: Vec<&Number> = present().filter_map(Value::as_number).collect();
                sum_numbers(&nums)
            }
            Self::Mean => {
                let nums: Vec<f64> = present().filter_map(Value::as_f64).collect();
                if nums.is_empty() {
                    Value::Null
                } else {
                    float_value(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            }
            Self::Median => {
                let mut nums: Vec<f64> = present().filter_map(Value::as_f64).collect();
                if nums.is_empty() {
                    return Value::Null;
                }
                nums.sort_by(|a, b| a.total_cmp(b));
                let mid = nums.len() / 2;
                if nums.len() % 2 == 1 {
                    float_value(nums[mid])
                } else {
                    float_value((nums[mid - 1] + nums[mid]) / 2.0)
                }
            }
            Self::Min => present()
                .min_by(|a, b| total_cmp(Some(a), Some(b)))
                .cloned()
                .unwrap_or(Value::Null),
            Self::Max => present()
                .max_by(|a, b| total_cmp(Some(a), Some(b)))
                .cloned()
                .unwrap_or(Value::Null),
            Self::First => values
                .iter()
                .find_map(|v| *v)
                .cloned()
                .unwrap_or(Value::Null),
            Self::Last => values
                .iter()
                .rev()
                .find_map(|v| *v)
                .cloned()
                .unwrap_or(Value::Null),
        }
    }
}

impl FromStr for AggFunc {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "count_distinct" | "nunique" => Ok(Self::CountDistinct),
            "sum" => Ok(Self::Sum),
            "mean" | "avg" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            _ => Err(()),
        }
    }
}

/// Integer sum while every addend is an integer and nothing overflows
fn sum_numbers(nums: &[&Number]) -> Value {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    for n in nums {
        int_total = match (int_total, n.as_i64()) {
            (Some(acc), Some(i)) => acc.checked_add(i),
            _ => None,
        };
        float_total += n.as_f64().unwrap_or(0.0);
    }
    match int_total {
        Some(total) => Value::from(total),
        None => float_value(float_total),
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// One output column
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub name: String,
    pub source: String,
    pub func: AggFunc,
}

/// Validated aggregation: group fields plus output columns
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatePlan {
    pub group_by: Vec<String>,
    pub columns: Vec<OutputColumn>,
}

impl AggregatePlan {
    pub fn from_params(params: AggregateParams) -> Result<Self> {
        let group_by = params.group_by.into_vec();
        if group_by.iter().any(|f| f.is_empty()) {
            return Err(AionError::validation("aggregate", "'group_by' fields cannot be empty"));
        }

        let mut columns = Vec::new();
        for (source, funcs) in params.aggregations {
            let funcs = funcs.into_vec();
            if funcs.is_empty() {
                return Err(AionError::validation(
                    "aggregate",
                    format!("no aggregation function given for '{}'", source),
                ));
            }
            let single = funcs.len() == 1;
            for name in funcs {
                let func = name.parse::<AggFunc>().map_err(|_| AionError::UnknownAggregation {
                    function: name.clone(),
                    field: source.clone(),
                })?;
                let column = if single {
                    source.clone()
                } else {
                    format!("{}_{}", source, func.as_str())
                };
                columns.push(OutputColumn {
                    name: column,
                    source: source.clone(),
                    func,
                });
            }
        }

        if let Some(clash) = columns.iter().find(|c| group_by.contains(&c.name)) {
            return Err(AionError::validation(
                "aggregate",
                format!("output column '{}' collides with a group_by field", clash.name),
            ));
        }

        Ok(Self { group_by, columns })
    }

    /// Group records by key tuple, groups in ascending key order.
    ///
    /// Keys equal under `total_cmp` (`1` and `1.0`) share a group; the group
    /// keeps the key of its first record.
    pub fn partition<'a>(&self, input: &'a RecordStore) -> Vec<(Vec<Value>, Vec<&'a Record>)> {
        let mut keyed: Vec<(Vec<Value>, &'a Record)> = input
            .iter()
            .map(|record| {
                let key = self
                    .group_by
                    .iter()
                    .map(|f| path::lookup(record, f).cloned().unwrap_or(Value::Null))
                    .collect();
                (key, record)
            })
            .collect();
        // stable: members stay in input order
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b));

        let mut groups: Vec<(Vec<Value>, Vec<&'a Record>)> = Vec::new();
        for (key, record) in keyed {
            match groups.last_mut() {
                Some((current, members)) if compare_keys(current.as_slice(), &key).is_eq() => {
                    members.push(record)
                }
                _ => groups.push((key, vec![record])),
            }
        }
        groups
    }

    pub fn apply(&self, input: &RecordStore) -> RecordStore {
        self.partition(input)
            .into_iter()
            .map(|(key, members)| {
                let mut out = Record::new();
                for (field, value) in self.group_by.iter().zip(key) {
                    out.insert(field.clone(), value);
                }
                for column in &self.columns {
                    let values: Vec<Option<&Value>> = members
                        .iter()
                        .map(|r| path::lookup(r, &column.source))
                        .collect();
                    out.insert(column.name.clone(), column.func.apply(&values));
                }
                out
            })
            .collect()
    }
}

fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| total_cmp(Some(x), Some(y)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

pub struct AggregateResolver;

impl AggregateResolver {
    fn plan(task: &TaskDescriptor) -> Result<AggregatePlan> {
        AggregatePlan::from_params(parse_params(task)?)
    }
}

#[async_trait]
impl TaskResolver for AggregateResolver {
    fn validate(&self, task: &TaskDescriptor) -> Result<()> {
        Self::plan(task).map(|_| ())
    }

    #[instrument(name = "aggregate", skip_all, fields(records_in = input.len()))]
    async fn execute(
        &self,
        input: &RecordStore,
        task: &TaskDescriptor,
        _ctx: &TaskContext,
    ) -> Result<TaskOutput> {
        let plan = Self::plan(task)?;
        Ok(TaskOutput::Records(plan.apply(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plan(raw: Value) -> Result<AggregatePlan> {
        let mut task = TaskDescriptor::new("aggregate");
        if let Value::Object(map) = raw {
            task.params = map;
        }
        AggregateResolver::plan(&task)
    }

    fn sales() -> RecordStore {
        RecordStore::from_value(json!([
            {"city": "Paris", "amount": 10, "rep": "a"},
            {"city": "Lyon", "amount": 5, "rep": "b"},
            {"city": "Paris", "amount": 7.5, "rep": "a"},
            {"amount": 1, "rep": "c"},
            {"city": "Lyon", "amount": 3, "rep": "d"}
        ]))
    }

    #[test]
    fn groups_sorted_by_key_with_null_first() {
        let p = plan(json!({"group_by": "city", "aggregations": {"amount": "sum"}})).unwrap();
        let out = p.apply(&sales());
        assert_eq!(
            out.to_value(),
            json!([
                {"city": null, "amount": 1},
                {"city": "Lyon", "amount": 8},
                {"city": "Paris", "amount": 17.5}
            ])
        );
    }

    #[test]
    fn multiple_functions_get_suffixed_names() {
        let p = plan(json!({
            "group_by": ["city"],
            "aggregations": {"amount": ["count", "mean", "max"], "rep": "count_distinct"}
        }))
        .unwrap();
        let out = p.apply(&sales());
        let paris = out.get(2).unwrap();
        assert_eq!(paris["amount_count"], json!(2));
        assert_eq!(paris["amount_mean"], json!(8.75));
        assert_eq!(paris["amount_max"], json!(10));
        assert_eq!(paris["rep"], json!(1));
    }

    #[test]
    fn empty_group_by_is_one_global_group() {
        let p = plan(json!({"aggregations": {"amount": ["sum", "median", "first", "last"]}})).unwrap();
        let out = p.apply(&sales());
        assert_eq!(out.len(), 1);
        let row = out.get(0).unwrap();
        assert_eq!(row["amount_sum"], json!(26.5));
        assert_eq!(row["amount_median"], json!(5.0));
        assert_eq!(row["amount_first"], json!(10));
        assert_eq!(row["amount_last"], json!(3));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let p = plan(json!({"aggregations": {"amount": "count"}})).unwrap();
        assert!(p.apply(&RecordStore::empty()).is_empty());
    }

    #[test]
    fn unknown_function_is_reported_at_validation() {
        let err = plan(json!({"group_by": "city", "aggregations": {"amount": "mode"}})).unwrap_err();
        assert!(matches!(
            err,
            AionError::UnknownAggregation { ref function, ref field } if function == "mode" && field == "amount"
        ));
    }

    #[test]
    fn partition_covers_every_record() {
        let p = plan(json!({"group_by": ["city", "rep"], "aggregations": {}})).unwrap();
        let total: usize = p.partition(&sales()).iter().map(|(_, m)| m.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn numerically_equal_keys_share_a_group() {
        let p = plan(json!({"group_by": "k", "aggregations": {"v": ["sum", "count"]}})).unwrap();
        let input = RecordStore::from_value(json!([
            {"k": 1, "v": 5},
            {"k": 1.0, "v": 5},
            {"k": 1, "v": 6}
        ]));

        let groups = p.partition(&input);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, vec![json!(1)]);
        let members: Vec<&Value> = groups[0].1.iter().map(|r| &r["v"]).collect();
        assert_eq!(members, vec![&json!(5), &json!(5), &json!(6)]);

        assert_eq!(
            p.apply(&input).to_value(),
            json!([{"k": 1, "v_sum": 16, "v_count": 3}])
        );
    }

    #[test]
    fn numeric_functions_skip_non_numbers() {
        let values = [Some(&json!("x")), None, Some(&json!(null))];
        assert_eq!(AggFunc::Sum.apply(&values), json!(0));
        assert_eq!(AggFunc::Mean.apply(&values), Value::Null);
        assert_eq!(AggFunc::Count.apply(&values), json!(1));
    }
}
