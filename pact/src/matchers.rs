//! Matcher tree: expected values described by rules instead of literals.
//!
//! A [`MatcherNode`] is a closed set of matching rules. Every node carries an
//! example value, so a tree can always be turned into a concrete body with
//! [`MatcherNode::example`].
//!
//! # Wire format
//!
//! A node is written either as a literal JSON value (exact match) or as an
//! annotated object:
//!
//! ```json
//! {"pact:matcher:type": "regex", "regex": "\\d+", "value": "42"}
//! ```
//!
//! Plain JSON objects decode as [`MatcherNode::ObjectNode`] with every key
//! required; plain arrays and scalars decode as [`MatcherNode::ExactValue`].

use crate::matching;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};

/// Key marking an annotated matcher object.
pub const MATCHER_TYPE_KEY: &str = "pact:matcher:type";

/// A matching rule for one position in an expected value.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherNode {
    /// Deep equality with the value.
    ExactValue(Value),
    /// Any value of the same kind as the example.
    TypeMatch(Value),
    /// Any integer-valued number.
    IntegerMatch(i64),
    /// Any string fully matching the pattern.
    RegexMatch {
        /// Regular expression, implicitly anchored at both ends
        pattern: String,
        /// Example string matching the pattern
        example: String,
    },
    /// An array whose every element matches one template.
    ArrayLike {
        /// Template applied to every element
        element: Box<MatcherNode>,
        /// Minimum number of elements
        min: usize,
    },
    /// An object with per-key rules; unknown actual keys are ignored.
    ObjectNode(ObjectMatcher),
}

/// Field rules of an object node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMatcher {
    fields: BTreeMap<String, MatcherNode>,
    optional: BTreeSet<String>,
}

impl ObjectMatcher {
    /// Create an empty object matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, node: impl Into<MatcherNode>) -> Self {
        let name = name.into();
        self.optional.remove(&name);
        self.fields.insert(name, node.into());
        self
    }

    /// Add a field that may be absent from the actual object.
    #[must_use]
    pub fn optional_field(mut self, name: impl Into<String>, node: impl Into<MatcherNode>) -> Self {
        let name = name.into();
        self.fields.insert(name.clone(), node.into());
        self.optional.insert(name);
        self
    }

    /// Field rules keyed by name.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, MatcherNode> {
        &self.fields
    }

    /// Whether the named field may be absent.
    #[must_use]
    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.contains(name)
    }

    fn needs_annotation(&self) -> bool {
        !self.optional.is_empty() || self.fields.contains_key(MATCHER_TYPE_KEY)
    }
}

/// Exact match. Objects become object nodes with exact fields.
#[must_use]
pub fn exact(value: impl Into<Value>) -> MatcherNode {
    MatcherNode::literal(value.into())
}

/// Type match against an example (`Like` in most pact DSLs).
#[must_use]
pub fn like(example: impl Into<Value>) -> MatcherNode {
    MatcherNode::TypeMatch(example.into())
}

/// Integer match with an example value.
#[must_use]
pub const fn integer(example: i64) -> MatcherNode {
    MatcherNode::IntegerMatch(example)
}

/// Regex match with an example value.
#[must_use]
pub fn regex(pattern: impl Into<String>, example: impl Into<String>) -> MatcherNode {
    MatcherNode::RegexMatch {
        pattern: pattern.into(),
        example: example.into(),
    }
}

/// Array of at least `min` elements, each matching `element`.
#[must_use]
pub fn each_like(element: impl Into<MatcherNode>, min: usize) -> MatcherNode {
    MatcherNode::ArrayLike {
        element: Box::new(element.into()),
        min,
    }
}

/// Object node with every listed field required.
#[must_use]
pub fn object<I, K>(fields: I) -> MatcherNode
where
    I: IntoIterator<Item = (K, MatcherNode)>,
    K: Into<String>,
{
    let matcher = fields
        .into_iter()
        .fold(ObjectMatcher::new(), |acc, (name, node)| acc.field(name, node));
    MatcherNode::ObjectNode(matcher)
}

impl MatcherNode {
    /// Interpret a plain JSON value as an exact-match tree.
    ///
    /// Objects become object nodes so nested matchers can be mixed in later;
    /// arrays and scalars become exact values.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::ObjectNode(ObjectMatcher {
                fields: map
                    .into_iter()
                    .map(|(name, child)| (name, Self::literal(child)))
                    .collect(),
                optional: BTreeSet::new(),
            }),
            other => Self::ExactValue(other),
        }
    }

    /// Concrete value satisfying this node, built from example values.
    ///
    /// Array templates produce `max(min, 1)` copies of the element example.
    /// Optional object fields are included.
    #[must_use]
    pub fn example(&self) -> Value {
        match self {
            Self::ExactValue(value) | Self::TypeMatch(value) => value.clone(),
            Self::IntegerMatch(example) => json!(example),
            Self::RegexMatch { example, .. } => Value::String(example.clone()),
            Self::ArrayLike { element, min } => {
                let sample = element.example();
                Value::Array(vec![sample; (*min).max(1)])
            }
            Self::ObjectNode(matcher) => Value::Object(
                matcher
                    .fields
                    .iter()
                    .map(|(name, node)| (name.clone(), node.example()))
                    .collect(),
            ),
        }
    }

    /// Check that every regex compiles and the tree's example satisfies it.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the tree is unusable.
    pub fn validate(&self) -> Result<(), String> {
        self.check_patterns()?;
        let result = matching::match_value(self, &self.example());
        match result.diffs().first() {
            None => Ok(()),
            Some(diff) => Err(format!("example does not satisfy its own matcher: {diff}")),
        }
    }

    fn check_patterns(&self) -> Result<(), String> {
        match self {
            Self::RegexMatch { pattern, .. } => Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| format!("invalid regex /{pattern}/: {e}")),
            Self::ArrayLike { element, .. } => element.check_patterns(),
            Self::ObjectNode(matcher) => matcher
                .fields
                .values()
                .try_for_each(Self::check_patterns),
            Self::ExactValue(_) | Self::TypeMatch(_) | Self::IntegerMatch(_) => Ok(()),
        }
    }

    /// Encode this node in the contract wire format.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::ExactValue(Value::Object(map)) => annotated("exact", Value::Object(map.clone())),
            Self::ExactValue(value) => value.clone(),
            Self::TypeMatch(example) => annotated("type", example.clone()),
            Self::IntegerMatch(example) => annotated("integer", json!(example)),
            Self::RegexMatch { pattern, example } => {
                let mut node = annotated("regex", Value::String(example.clone()));
                node["regex"] = Value::String(pattern.clone());
                node
            }
            Self::ArrayLike { element, min } => {
                let mut node = annotated("arrayLike", Value::Array(vec![element.to_json()]));
                node["min"] = json!(min);
                node
            }
            Self::ObjectNode(matcher) => {
                let fields: Map<String, Value> = matcher
                    .fields
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_json()))
                    .collect();
                if matcher.needs_annotation() {
                    let mut node = annotated("object", Value::Object(fields));
                    node["optional"] = json!(matcher.optional);
                    node
                } else {
                    Value::Object(fields)
                }
            }
        }
    }

    /// Decode a node from the contract wire format.
    ///
    /// # Errors
    ///
    /// Returns a reason when an annotated object has an unknown kind or is
    /// missing the fields its kind requires.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Ok(Self::ExactValue(value.clone()));
        };
        let Some(Value::String(kind)) = map.get(MATCHER_TYPE_KEY) else {
            return Ok(Self::ObjectNode(ObjectMatcher {
                fields: decode_fields(map)?,
                optional: BTreeSet::new(),
            }));
        };

        let example = map
            .get("value")
            .ok_or_else(|| format!("'{kind}' matcher is missing 'value'"))?;

        match kind.as_str() {
            "exact" => Ok(Self::ExactValue(example.clone())),
            "type" => Ok(Self::TypeMatch(example.clone())),
            "integer" => example
                .as_i64()
                .map(Self::IntegerMatch)
                .ok_or_else(|| format!("'integer' matcher example must be an integer, got {example}")),
            "regex" => {
                let pattern = map
                    .get("regex")
                    .and_then(Value::as_str)
                    .ok_or("'regex' matcher is missing 'regex'")?;
                let example = example
                    .as_str()
                    .ok_or("'regex' matcher example must be a string")?;
                Ok(regex(pattern, example))
            }
            "arrayLike" => {
                let template = match example.as_array().map(Vec::as_slice) {
                    Some([template]) => template,
                    _ => return Err("'arrayLike' matcher value must hold exactly one element".to_string()),
                };
                let min = match map.get("min") {
                    None => 1,
                    Some(min) => min
                        .as_u64()
                        .and_then(|m| usize::try_from(m).ok())
                        .ok_or("'arrayLike' matcher 'min' must be a non-negative integer")?,
                };
                Ok(each_like(Self::from_json(template)?, min))
            }
            "object" => {
                let fields = example
                    .as_object()
                    .ok_or("'object' matcher value must be an object")?;
                let fields = decode_fields(fields)?;
                let optional = match map.get("optional") {
                    None => BTreeSet::new(),
                    Some(list) => serde_json::from_value(list.clone())
                        .map_err(|e| format!("'object' matcher 'optional' must list field names: {e}"))?,
                };
                Ok(Self::ObjectNode(ObjectMatcher { fields, optional }))
            }
            other => Err(format!("unknown matcher type '{other}'")),
        }
    }

    /// Short description of what this node accepts.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ExactValue(value) => value.to_string(),
            Self::TypeMatch(example) => format!("a value of type {}", matching::JsonKind::of(example)),
            Self::IntegerMatch(_) => "an integer".to_string(),
            Self::RegexMatch { pattern, .. } => format!("a string matching /{pattern}/"),
            Self::ArrayLike { min, .. } => format!("an array with at least {min} element(s)"),
            Self::ObjectNode(_) => "an object".to_string(),
        }
    }
}

fn annotated(kind: &str, value: Value) -> Value {
    json!({ MATCHER_TYPE_KEY: kind, "value": value })
}

fn decode_fields(map: &Map<String, Value>) -> Result<BTreeMap<String, MatcherNode>, String> {
    map.iter()
        .map(|(name, child)| {
            MatcherNode::from_json(child)
                .map(|node| (name.clone(), node))
                .map_err(|e| format!("{name}: {e}"))
        })
        .collect()
}

impl Serialize for MatcherNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MatcherNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(de::Error::custom)
    }
}

impl From<Value> for MatcherNode {
    fn from(value: Value) -> Self {
        Self::literal(value)
    }
}

impl From<&str> for MatcherNode {
    fn from(value: &str) -> Self {
        Self::ExactValue(Value::String(value.to_string()))
    }
}

impl From<String> for MatcherNode {
    fn from(value: String) -> Self {
        Self::ExactValue(Value::String(value))
    }
}

impl From<i64> for MatcherNode {
    fn from(value: i64) -> Self {
        Self::ExactValue(json!(value))
    }
}

impl From<bool> for MatcherNode {
    fn from(value: bool) -> Self {
        Self::ExactValue(Value::Bool(value))
    }
}

impl From<ObjectMatcher> for MatcherNode {
    fn from(matcher: ObjectMatcher) -> Self {
        Self::ObjectNode(matcher)
    }
}
