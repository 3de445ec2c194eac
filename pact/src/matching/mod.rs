//! Match engine: compares actual JSON values against matcher trees.
//!
//! Matching is structural recursion on the expected node. Mismatches are
//! accumulated, never short-circuited, and every mismatch carries the path
//! of the offending value in dot/bracket notation (`.projects[0].id`). The
//! root path is the empty string.

pub mod http;

use crate::matchers::MatcherNode;
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;

pub use http::{
    ActualRequest, ActualResponse, HttpMismatch, Section, match_request, match_response,
    match_route, parse_body,
};

/// One divergence between expected and actual values.
#[derive(Debug, Clone, PartialEq)]
pub struct PathedMismatch {
    /// Location of the value, empty for the root
    pub path: String,
    /// What the matcher accepts
    pub expected: String,
    /// Actual value, `None` when missing
    pub actual: Option<Value>,
}

impl fmt::Display for PathedMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "$" } else { &self.path };
        write!(f, "{path}: ")?;
        write_detail(f, self)
    }
}

fn write_detail(f: &mut fmt::Formatter<'_>, diff: &PathedMismatch) -> fmt::Result {
    match &diff.actual {
        Some(actual) => write!(f, "expected {}, got {actual}", diff.expected),
        None => write!(f, "expected {}, but it was missing", diff.expected),
    }
}

/// Result of matching one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    diffs: Vec<PathedMismatch>,
}

impl MatchResult {
    /// Whether the value matched.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.diffs.is_empty()
    }

    /// All mismatches, in tree order.
    #[must_use]
    pub fn diffs(&self) -> &[PathedMismatch] {
        &self.diffs
    }

    /// Take ownership of the mismatches.
    #[must_use]
    pub fn into_diffs(self) -> Vec<PathedMismatch> {
        self.diffs
    }
}

/// Kind of a JSON value, as compared by type matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Any number
    Number,
    /// Any string
    String,
    /// Any array
    Array,
    /// Any object
    Object,
}

impl JsonKind {
    /// Kind of the given value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// Match an actual value against an expected tree.
#[must_use]
pub fn match_value(expected: &MatcherNode, actual: &Value) -> MatchResult {
    match_value_at(expected, actual, "")
}

/// Match with every reported path prefixed by `path`.
#[must_use]
pub fn match_value_at(expected: &MatcherNode, actual: &Value, path: &str) -> MatchResult {
    let mut walker = Walker::default();
    walker.node(expected, actual, path);
    MatchResult {
        diffs: walker.diffs,
    }
}

/// One match call: collected diffs plus the patterns compiled so far, so an
/// array template compiles its regex once for all elements.
#[derive(Default)]
struct Walker<'a> {
    diffs: Vec<PathedMismatch>,
    patterns: HashMap<&'a str, Result<Regex, String>>,
}

impl<'a> Walker<'a> {
    fn node(&mut self, expected: &'a MatcherNode, actual: &Value, path: &str) {
        match expected {
            MatcherNode::ExactValue(value) => {
                if !values_equal(value, actual) {
                    self.diffs.push(mismatch(path, expected.describe(), actual));
                }
            }
            MatcherNode::TypeMatch(example) => match_type(example, actual, path, &mut self.diffs),
            MatcherNode::IntegerMatch(_) => {
                let integral = match actual {
                    Value::Number(n) => is_integral(n),
                    _ => false,
                };
                if !integral {
                    self.diffs.push(mismatch(path, expected.describe(), actual));
                }
            }
            MatcherNode::RegexMatch { pattern, .. } => match compiled(&mut self.patterns, pattern) {
                Err(e) => {
                    let expected = format!("a valid pattern, /{pattern}/ failed: {e}");
                    self.diffs.push(mismatch(path, expected, actual));
                }
                Ok(re) => {
                    if !actual.as_str().is_some_and(|s| re.is_match(s)) {
                        self.diffs.push(mismatch(path, expected.describe(), actual));
                    }
                }
            },
            MatcherNode::ArrayLike { element, min } => {
                let Value::Array(items) = actual else {
                    self.diffs.push(mismatch(path, expected.describe(), actual));
                    return;
                };
                if items.len() < *min {
                    self.diffs.push(mismatch(path, expected.describe(), actual));
                }
                for (index, item) in items.iter().enumerate() {
                    self.node(element, item, &index_path(path, index));
                }
            }
            MatcherNode::ObjectNode(matcher) => {
                let Value::Object(map) = actual else {
                    self.diffs.push(mismatch(path, expected.describe(), actual));
                    return;
                };
                for (name, node) in matcher.fields() {
                    let child_path = key_path(path, name);
                    match map.get(name) {
                        Some(value) => self.node(node, value, &child_path),
                        None if matcher.is_optional(name) => {}
                        None => self.diffs.push(PathedMismatch {
                            path: child_path,
                            expected: node.describe(),
                            actual: None,
                        }),
                    }
                }
            }
        }
    }
}

/// Compiled, fully anchored form of `pattern`.
fn compiled<'p, 'k>(
    patterns: &'p mut HashMap<&'k str, Result<Regex, String>>,
    pattern: &'k str,
) -> Result<&'p Regex, &'p str> {
    patterns
        .entry(pattern)
        .or_insert_with(|| Regex::new(&format!("^(?:{pattern})$")).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(String::as_str)
}

/// Type matching cascades into object and array examples.
///
/// Array elements compare against the example element at the same index.
fn match_type(example: &Value, actual: &Value, path: &str, diffs: &mut Vec<PathedMismatch>) {
    let expected_kind = JsonKind::of(example);
    if expected_kind != JsonKind::of(actual) {
        diffs.push(mismatch(path, format!("a value of type {expected_kind}"), actual));
        return;
    }
    match (example, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            for (name, child) in expected {
                let child_path = key_path(path, name);
                match actual.get(name) {
                    Some(value) => match_type(child, value, &child_path, diffs),
                    None => diffs.push(PathedMismatch {
                        path: child_path,
                        expected: format!("a value of type {}", JsonKind::of(child)),
                        actual: None,
                    }),
                }
            }
        }
        (Value::Array(expected), Value::Array(actual)) => {
            // Elements past the end of the example compare against its first element.
            for (index, item) in actual.iter().enumerate() {
                if let Some(template) = expected.get(index).or_else(|| expected.first()) {
                    match_type(template, item, &index_path(path, index), diffs);
                }
            }
        }
        _ => {}
    }
}

fn mismatch(path: &str, expected: impl Into<String>, actual: &Value) -> PathedMismatch {
    PathedMismatch {
        path: path.to_string(),
        expected: expected.into(),
        actual: Some(actual.clone()),
    }
}

/// Deep equality where numbers compare by mathematical value.
#[must_use]
pub fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => expected == actual,
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn is_integral(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

fn key_path(parent: &str, key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        format!("{parent}.{key}")
    } else {
        format!("{parent}[{key:?}]")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}
