//! The Brainy Field Operator predicate tree (§4.2).
//!
//! A [`FilterNode`] is the wire/API-facing, serializable shape of a
//! `where` clause. [`FilterNode::compile`] turns it into a
//! [`CompiledFilter`] — regexes parsed once, depth already checked —
//! which is what the query engine actually evaluates per-candidate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

use super::value::Metadata;

/// Maximum nesting depth of a filter tree (`allOf`/`anyOf`/`not`).
///
/// Guards against pathological or adversarial filter trees driving the
/// compiler into deep recursion; typical filters are 1-3 levels deep.
pub const MAX_FILTER_DEPTH: usize = 16;

/// Numeric/ordinal comparison used by [`FilterNode::Length`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericCmp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl NumericCmp {
    fn apply(&self, a: i64, b: i64) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Gt => a > b,
            Self::Gte => a >= b,
            Self::Lt => a < b,
            Self::Lte => a <= b,
        }
    }
}

/// A Brainy Field Operator node, the raw (serializable) shape of a filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FilterNode {
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    GreaterThan { field: String, value: Value },
    GreaterThanOrEqual { field: String, value: Value },
    LessThan { field: String, value: Value },
    LessThanOrEqual { field: String, value: Value },
    Between { field: String, low: Value, high: Value },
    OneOf { field: String, values: Vec<Value> },
    NoneOf { field: String, values: Vec<Value> },
    /// Array contains `value`, or string contains substring `value`.
    Contains { field: String, value: Value },
    /// Negation of [`FilterNode::Contains`].
    Excludes { field: String, value: Value },
    /// Array is a superset of `values`.
    HasAll { field: String, values: Vec<Value> },
    /// Compares the length of an array/string field against `value`.
    Length { field: String, cmp: NumericCmp, value: i64 },
    Exists { field: String },
    Missing { field: String },
    MatchesRegex { field: String, pattern: String },
    StartsWith { field: String, prefix: String },
    EndsWith { field: String, suffix: String },
    AllOf(Vec<FilterNode>),
    AnyOf(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

impl FilterNode {
    /// Compiles this node (and its descendants) into a [`CompiledFilter`],
    /// parsing every regex once and rejecting trees deeper than
    /// [`MAX_FILTER_DEPTH`].
    pub fn compile(&self) -> Result<CompiledFilter, ValidationError> {
        self.compile_at_depth(0)
    }

    fn compile_at_depth(&self, depth: usize) -> Result<CompiledFilter, ValidationError> {
        if depth > MAX_FILTER_DEPTH {
            return Err(ValidationError::invalid_filter(format!(
                "filter tree exceeds max depth of {MAX_FILTER_DEPTH}"
            )));
        }
        Ok(match self {
            Self::Equals { field, value } => CompiledFilter::Equals {
                field: field.clone(),
                value: value.clone(),
            },
            Self::NotEquals { field, value } => CompiledFilter::NotEquals {
                field: field.clone(),
                value: value.clone(),
            },
            Self::GreaterThan { field, value } => CompiledFilter::GreaterThan {
                field: field.clone(),
                value: value.clone(),
            },
            Self::GreaterThanOrEqual { field, value } => CompiledFilter::GreaterThanOrEqual {
                field: field.clone(),
                value: value.clone(),
            },
            Self::LessThan { field, value } => CompiledFilter::LessThan {
                field: field.clone(),
                value: value.clone(),
            },
            Self::LessThanOrEqual { field, value } => CompiledFilter::LessThanOrEqual {
                field: field.clone(),
                value: value.clone(),
            },
            Self::Between { field, low, high } => CompiledFilter::Between {
                field: field.clone(),
                low: low.clone(),
                high: high.clone(),
            },
            Self::OneOf { field, values } => CompiledFilter::OneOf {
                field: field.clone(),
                values: values.clone(),
            },
            Self::NoneOf { field, values } => CompiledFilter::NoneOf {
                field: field.clone(),
                values: values.clone(),
            },
            Self::Contains { field, value } => CompiledFilter::Contains {
                field: field.clone(),
                value: value.clone(),
            },
            Self::Excludes { field, value } => CompiledFilter::Excludes {
                field: field.clone(),
                value: value.clone(),
            },
            Self::HasAll { field, values } => CompiledFilter::HasAll {
                field: field.clone(),
                values: values.clone(),
            },
            Self::Length { field, cmp, value } => CompiledFilter::Length {
                field: field.clone(),
                cmp: *cmp,
                value: *value,
            },
            Self::Exists { field } => CompiledFilter::Exists { field: field.clone() },
            Self::Missing { field } => CompiledFilter::Missing { field: field.clone() },
            Self::MatchesRegex { field, pattern } => CompiledFilter::MatchesRegex {
                field: field.clone(),
                regex: regex::Regex::new(pattern)
                    .map_err(|e| ValidationError::invalid_filter(format!("bad regex: {e}")))?,
            },
            Self::StartsWith { field, prefix } => CompiledFilter::StartsWith {
                field: field.clone(),
                prefix: prefix.clone(),
            },
            Self::EndsWith { field, suffix } => CompiledFilter::EndsWith {
                field: field.clone(),
                suffix: suffix.clone(),
            },
            Self::AllOf(nodes) => CompiledFilter::AllOf(
                nodes
                    .iter()
                    .map(|n| n.compile_at_depth(depth + 1))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::AnyOf(nodes) => CompiledFilter::AnyOf(
                nodes
                    .iter()
                    .map(|n| n.compile_at_depth(depth + 1))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Not(inner) => CompiledFilter::Not(Box::new(inner.compile_at_depth(depth + 1)?)),
        })
    }
}

/// A compiled, ready-to-evaluate filter tree.
#[derive(Debug)]
pub enum CompiledFilter {
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    GreaterThan { field: String, value: Value },
    GreaterThanOrEqual { field: String, value: Value },
    LessThan { field: String, value: Value },
    LessThanOrEqual { field: String, value: Value },
    Between { field: String, low: Value, high: Value },
    OneOf { field: String, values: Vec<Value> },
    NoneOf { field: String, values: Vec<Value> },
    Contains { field: String, value: Value },
    Excludes { field: String, value: Value },
    HasAll { field: String, values: Vec<Value> },
    Length { field: String, cmp: NumericCmp, value: i64 },
    Exists { field: String },
    Missing { field: String },
    MatchesRegex { field: String, regex: regex::Regex },
    StartsWith { field: String, prefix: String },
    EndsWith { field: String, suffix: String },
    AllOf(Vec<CompiledFilter>),
    AnyOf(Vec<CompiledFilter>),
    Not(Box<CompiledFilter>),
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

fn contains(container: &Value, needle: &Value) -> bool {
    match container {
        Value::Array(items) => items.contains(needle),
        Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<i64> {
    match value {
        Value::Array(items) => Some(items.len() as i64),
        Value::String(s) => Some(s.chars().count() as i64),
        _ => None,
    }
}

impl CompiledFilter {
    /// Evaluates this filter against a metadata document.
    ///
    /// Missing fields make every comparison operator (other than
    /// [`CompiledFilter::Missing`] itself) evaluate to `false` rather than
    /// erroring — a `where` clause on an absent field simply excludes the
    /// entity.
    pub fn matches(&self, doc: &Metadata) -> bool {
        match self {
            Self::Equals { field, value } => doc.get(field) == Some(value),
            Self::NotEquals { field, value } => doc.get(field).map(|v| v != value).unwrap_or(true),
            Self::GreaterThan { field, value } => doc
                .get(field)
                .and_then(|v| numeric_cmp(v, value))
                .map(|o| o.is_gt())
                .unwrap_or(false),
            Self::GreaterThanOrEqual { field, value } => doc
                .get(field)
                .and_then(|v| numeric_cmp(v, value))
                .map(|o| o.is_ge())
                .unwrap_or(false),
            Self::LessThan { field, value } => doc
                .get(field)
                .and_then(|v| numeric_cmp(v, value))
                .map(|o| o.is_lt())
                .unwrap_or(false),
            Self::LessThanOrEqual { field, value } => doc
                .get(field)
                .and_then(|v| numeric_cmp(v, value))
                .map(|o| o.is_le())
                .unwrap_or(false),
            Self::Between { field, low, high } => doc
                .get(field)
                .map(|v| {
                    numeric_cmp(v, low).map(|o| o.is_ge()).unwrap_or(false)
                        && numeric_cmp(v, high).map(|o| o.is_le()).unwrap_or(false)
                })
                .unwrap_or(false),
            Self::OneOf { field, values } => {
                doc.get(field).map(|v| values.contains(v)).unwrap_or(false)
            }
            Self::NoneOf { field, values } => {
                doc.get(field).map(|v| !values.contains(v)).unwrap_or(true)
            }
            Self::Contains { field, value } => {
                doc.get(field).map(|v| contains(v, value)).unwrap_or(false)
            }
            Self::Excludes { field, value } => {
                doc.get(field).map(|v| !contains(v, value)).unwrap_or(true)
            }
            Self::HasAll { field, values } => doc
                .get(field)
                .map(|v| values.iter().all(|needle| contains(v, needle)))
                .unwrap_or(false),
            Self::Length { field, cmp, value } => doc
                .get(field)
                .and_then(length_of)
                .map(|len| cmp.apply(len, *value))
                .unwrap_or(false),
            Self::Exists { field } => doc.get(field).is_some(),
            Self::Missing { field } => doc.get(field).is_none(),
            Self::MatchesRegex { field, regex } => doc
                .get(field)
                .and_then(Value::as_str)
                .map(|s| regex.is_match(s))
                .unwrap_or(false),
            Self::StartsWith { field, prefix } => doc
                .get(field)
                .and_then(Value::as_str)
                .map(|s| s.starts_with(prefix.as_str()))
                .unwrap_or(false),
            Self::EndsWith { field, suffix } => doc
                .get(field)
                .and_then(Value::as_str)
                .map(|s| s.ends_with(suffix.as_str()))
                .unwrap_or(false),
            Self::AllOf(nodes) => nodes.iter().all(|n| n.matches(doc)),
            Self::AnyOf(nodes) => nodes.iter().any(|n| n.matches(doc)),
            Self::Not(inner) => !inner.matches(doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with(field: &str, value: Value) -> Metadata {
        let mut map = serde_json::Map::new();
        map.insert(field.to_string(), value);
        Metadata::new(map, crate::types::Timestamp::from_millis(0))
    }

    #[test]
    fn test_equals() {
        let doc = doc_with("age", json!(30));
        let f = FilterNode::Equals {
            field: "age".into(),
            value: json!(30),
        }
        .compile()
        .unwrap();
        assert!(f.matches(&doc));
    }

    #[test]
    fn test_not_equals_missing_field_is_true() {
        let doc = doc_with("age", json!(30));
        let f = FilterNode::NotEquals {
            field: "missing".into(),
            value: json!(1),
        }
        .compile()
        .unwrap();
        assert!(f.matches(&doc));
    }

    #[test]
    fn test_between_inclusive() {
        let doc = doc_with("age", json!(30));
        let f = FilterNode::Between {
            field: "age".into(),
            low: json!(30),
            high: json!(40),
        }
        .compile()
        .unwrap();
        assert!(f.matches(&doc));
    }

    #[test]
    fn test_one_of_and_none_of() {
        let doc = doc_with("color", json!("red"));
        let one_of = FilterNode::OneOf {
            field: "color".into(),
            values: vec![json!("red"), json!("blue")],
        }
        .compile()
        .unwrap();
        assert!(one_of.matches(&doc));

        let none_of = FilterNode::NoneOf {
            field: "color".into(),
            values: vec![json!("green")],
        }
        .compile()
        .unwrap();
        assert!(none_of.matches(&doc));
    }

    #[test]
    fn test_contains_array_and_string() {
        let doc = doc_with("tags", json!(["rust", "db"]));
        let f = FilterNode::Contains {
            field: "tags".into(),
            value: json!("rust"),
        }
        .compile()
        .unwrap();
        assert!(f.matches(&doc));

        let doc2 = doc_with("name", json!("brainy-db"));
        let f2 = FilterNode::Contains {
            field: "name".into(),
            value: json!("db"),
        }
        .compile()
        .unwrap();
        assert!(f2.matches(&doc2));
    }

    #[test]
    fn test_has_all() {
        let doc = doc_with("tags", json!(["a", "b", "c"]));
        let f = FilterNode::HasAll {
            field: "tags".into(),
            values: vec![json!("a"), json!("c")],
        }
        .compile()
        .unwrap();
        assert!(f.matches(&doc));

        let f2 = FilterNode::HasAll {
            field: "tags".into(),
            values: vec![json!("a"), json!("z")],
        }
        .compile()
        .unwrap();
        assert!(!f2.matches(&doc));
    }

    #[test]
    fn test_length() {
        let doc = doc_with("tags", json!(["a", "b", "c"]));
        let f = FilterNode::Length {
            field: "tags".into(),
            cmp: NumericCmp::Gte,
            value: 3,
        }
        .compile()
        .unwrap();
        assert!(f.matches(&doc));
    }

    #[test]
    fn test_exists_and_missing() {
        let doc = doc_with("name", json!("x"));
        assert!(FilterNode::Exists { field: "name".into() }.compile().unwrap().matches(&doc));
        assert!(FilterNode::Missing { field: "nope".into() }.compile().unwrap().matches(&doc));
        assert!(!FilterNode::Missing { field: "name".into() }.compile().unwrap().matches(&doc));
    }

    #[test]
    fn test_regex_match() {
        let doc = doc_with("email", json!("a@example.com"));
        let f = FilterNode::MatchesRegex {
            field: "email".into(),
            pattern: r"^\w+@example\.com$".into(),
        }
        .compile()
        .unwrap();
        assert!(f.matches(&doc));
    }

    #[test]
    fn test_invalid_regex_fails_to_compile() {
        let f = FilterNode::MatchesRegex {
            field: "x".into(),
            pattern: "(".into(),
        };
        assert!(f.compile().is_err());
    }

    #[test]
    fn test_starts_with_and_ends_with() {
        let doc = doc_with("name", json!("brainy-db"));
        assert!(FilterNode::StartsWith {
            field: "name".into(),
            prefix: "brainy".into(),
        }
        .compile()
        .unwrap()
        .matches(&doc));
        assert!(FilterNode::EndsWith {
            field: "name".into(),
            suffix: "-db".into(),
        }
        .compile()
        .unwrap()
        .matches(&doc));
    }

    #[test]
    fn test_all_of_and_any_of_and_not() {
        let doc = doc_with("age", json!(30));
        let all_of = FilterNode::AllOf(vec![
            FilterNode::GreaterThan {
                field: "age".into(),
                value: json!(18),
            },
            FilterNode::LessThan {
                field: "age".into(),
                value: json!(40),
            },
        ])
        .compile()
        .unwrap();
        assert!(all_of.matches(&doc));

        let any_of = FilterNode::AnyOf(vec![
            FilterNode::Equals {
                field: "age".into(),
                value: json!(99),
            },
            FilterNode::Equals {
                field: "age".into(),
                value: json!(30),
            },
        ])
        .compile()
        .unwrap();
        assert!(any_of.matches(&doc));

        let not = FilterNode::Not(Box::new(FilterNode::Equals {
            field: "age".into(),
            value: json!(99),
        }))
        .compile()
        .unwrap();
        assert!(not.matches(&doc));
    }

    #[test]
    fn test_depth_limit_rejected() {
        let mut node = FilterNode::Exists { field: "x".into() };
        for _ in 0..(MAX_FILTER_DEPTH + 2) {
            node = FilterNode::Not(Box::new(node));
        }
        assert!(node.compile().is_err());
    }
}
