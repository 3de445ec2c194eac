//! Request and response matching on top of the value engine.

use super::{PathedMismatch, key_path, match_value_at, write_detail};
use crate::contract::{RequestSpec, ResponseSpec};
use crate::matchers::MatcherNode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Part of an HTTP message a mismatch was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Request method
    Method,
    /// Request path
    Path,
    /// Query parameters
    Query,
    /// Headers
    Header,
    /// Response status
    Status,
    /// Body
    Body,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Method => "method",
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Status => "status",
            Self::Body => "body",
        };
        f.write_str(name)
    }
}

/// A mismatch located in one section of an HTTP message.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpMismatch {
    /// Section the value belongs to
    pub section: Section,
    /// Value-level mismatch, path relative to the section
    pub diff: PathedMismatch,
}

impl fmt::Display for HttpMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: ", self.section, self.diff.path)?;
        write_detail(f, &self.diff)
    }
}

/// A request as seen on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActualRequest {
    /// Method, upper-case
    pub method: String,
    /// Path without query string
    pub path: String,
    /// Query parameters; repeated names collect into an array
    pub query: BTreeMap<String, Value>,
    /// Headers keyed by lower-case name
    pub headers: BTreeMap<String, String>,
    /// Parsed body, `None` when empty
    pub body: Option<Value>,
}

impl ActualRequest {
    /// Create a request with no query, headers or body.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Collect query parameters from a raw query string.
    #[must_use]
    pub fn with_query_string(mut self, query: &str) -> Self {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Value::String(value.into_owned());
            match self.query.remove(name.as_ref()) {
                None => {
                    self.query.insert(name.into_owned(), value);
                }
                Some(Value::Array(mut values)) => {
                    values.push(value);
                    self.query.insert(name.into_owned(), Value::Array(values));
                }
                Some(first) => {
                    self.query
                        .insert(name.into_owned(), Value::Array(vec![first, value]));
                }
            }
        }
        self
    }

    /// Add a header; the name is lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// The request a [`RequestSpec`] describes, built from its example values.
    #[must_use]
    pub fn from_example(spec: &RequestSpec) -> Self {
        Self {
            method: spec.method.as_str().to_string(),
            path: example_string(&spec.path),
            query: spec
                .query
                .iter()
                .map(|(name, node)| (name.clone(), wire_value(&node.example())))
                .collect(),
            headers: spec
                .headers
                .iter()
                .map(|(name, node)| (name.to_ascii_lowercase(), example_string(node)))
                .collect(),
            body: spec.body.as_ref().map(MatcherNode::example),
        }
    }

    /// Query parameters as name/value pairs, arrays expanded.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (name, value) in &self.query {
            match value {
                Value::Array(values) => {
                    pairs.extend(values.iter().map(|v| (name.clone(), scalar_string(v))));
                }
                other => pairs.push((name.clone(), scalar_string(other))),
            }
        }
        pairs
    }
}

/// A response as seen on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActualResponse {
    /// Status code
    pub status: u16,
    /// Headers keyed by lower-case name
    pub headers: BTreeMap<String, String>,
    /// Parsed body, `None` when empty
    pub body: Option<Value>,
}

/// Parse a message body: empty is `None`, non-JSON becomes a string.
#[must_use]
pub fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    )
}

/// Whether method and path match, ignoring everything else.
#[must_use]
pub fn match_route(spec: &RequestSpec, actual: &ActualRequest) -> bool {
    spec.method.as_str().eq_ignore_ascii_case(&actual.method)
        && match_value_at(&spec.path, &Value::String(actual.path.clone()), "").ok()
}

/// Full request match: method, path, query, headers and body.
#[must_use]
pub fn match_request(spec: &RequestSpec, actual: &ActualRequest) -> Vec<HttpMismatch> {
    let mut diffs = Vec::new();

    if !spec.method.as_str().eq_ignore_ascii_case(&actual.method) {
        diffs.push(HttpMismatch {
            section: Section::Method,
            diff: PathedMismatch {
                path: String::new(),
                expected: spec.method.to_string(),
                actual: Some(Value::String(actual.method.clone())),
            },
        });
    }

    let path = Value::String(actual.path.clone());
    extend(&mut diffs, Section::Path, match_value_at(&spec.path, &path, "").into_diffs());

    for (name, node) in &spec.query {
        let found = actual.query.get(name);
        match_named(&mut diffs, Section::Query, name, node, found);
    }

    match_headers(&mut diffs, &spec.headers, &actual.headers);
    match_body(&mut diffs, spec.body.as_ref(), actual.body.as_ref());
    diffs
}

/// Full response match: exact status, headers and body.
#[must_use]
pub fn match_response(spec: &ResponseSpec, actual: &ActualResponse) -> Vec<HttpMismatch> {
    let mut diffs = Vec::new();

    if spec.status != actual.status {
        diffs.push(HttpMismatch {
            section: Section::Status,
            diff: PathedMismatch {
                path: String::new(),
                expected: spec.status.to_string(),
                actual: Some(Value::from(actual.status)),
            },
        });
    }

    match_headers(&mut diffs, &spec.headers, &actual.headers);
    match_body(&mut diffs, spec.body.as_ref(), actual.body.as_ref());
    diffs
}

fn match_headers(
    diffs: &mut Vec<HttpMismatch>,
    expected: &BTreeMap<String, MatcherNode>,
    actual: &BTreeMap<String, String>,
) {
    for (name, node) in expected {
        let name = name.to_ascii_lowercase();
        let found = actual.get(&name).map(|v| Value::String(v.clone()));
        match_named(diffs, Section::Header, &name, node, found.as_ref());
    }
}

fn match_named(
    diffs: &mut Vec<HttpMismatch>,
    section: Section,
    name: &str,
    node: &MatcherNode,
    found: Option<&Value>,
) {
    let path = key_path("", name);
    match found {
        Some(value) => extend(diffs, section, match_value_at(node, value, &path).into_diffs()),
        None => diffs.push(HttpMismatch {
            section,
            diff: PathedMismatch {
                path,
                expected: node.describe(),
                actual: None,
            },
        }),
    }
}

fn match_body(diffs: &mut Vec<HttpMismatch>, expected: Option<&MatcherNode>, actual: Option<&Value>) {
    let Some(node) = expected else {
        return;
    };
    match actual {
        Some(body) => extend(diffs, Section::Body, match_value_at(node, body, "").into_diffs()),
        None => diffs.push(HttpMismatch {
            section: Section::Body,
            diff: PathedMismatch {
                path: String::new(),
                expected: node.describe(),
                actual: None,
            },
        }),
    }
}

fn extend(diffs: &mut Vec<HttpMismatch>, section: Section, found: Vec<PathedMismatch>) {
    diffs.extend(found.into_iter().map(|diff| HttpMismatch { section, diff }));
}

/// How a query or header example arrives on the wire: scalars become text,
/// arrays become repeated text values.
pub(crate) fn wire_value(value: &Value) -> Value {
    match value {
        Value::Array(values) => Value::Array(
            values
                .iter()
                .map(|v| Value::String(scalar_string(v)))
                .collect(),
        ),
        other => Value::String(scalar_string(other)),
    }
}

fn example_string(node: &MatcherNode) -> String {
    scalar_string(&node.example())
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
