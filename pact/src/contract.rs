//! Contract document types.
//!
//! An [`Interaction`] pairs one expected request with the response the
//! provider must return. A [`ContractDocument`] groups the interactions a
//! consumer expects from one provider.

use crate::error::{PactError, PactResult};
use crate::matchers::MatcherNode;
use crate::matching::http::wire_value;
use crate::matching::match_value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Contract document format version written by this engine.
pub const FORMAT_VERSION: &str = "1.0";

/// A participant in a contract (consumer or provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Participant name
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// HTTP method of an expected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = PactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(PactError::configuration(format!(
                "unsupported HTTP method '{other}'"
            ))),
        }
    }
}

/// Expected request of an interaction.
///
/// Header names are stored lower-case; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// HTTP method
    pub method: Method,
    /// Path, a literal string or a matcher producing a string
    pub path: MatcherNode,
    /// Expected headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, MatcherNode>,
    /// Expected query parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, MatcherNode>,
    /// Expected body; any body is accepted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<MatcherNode>,
}

/// Response the provider must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// HTTP status code, matched exactly
    pub status: u16,
    /// Expected headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, MatcherNode>,
    /// Expected body; any body is accepted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<MatcherNode>,
}

/// One expected request/response exchange.
///
/// Built with [`crate::InteractionBuilder`] or loaded from a document;
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_state: Option<String>,
    request: RequestSpec,
    response: ResponseSpec,
}

impl Interaction {
    pub(crate) const fn from_parts(
        description: String,
        provider_state: Option<String>,
        request: RequestSpec,
        response: ResponseSpec,
    ) -> Self {
        Self {
            description,
            provider_state,
            request,
            response,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Provider state label, if any.
    #[must_use]
    pub fn provider_state(&self) -> Option<&str> {
        self.provider_state.as_deref()
    }

    /// Expected request.
    #[must_use]
    pub const fn request(&self) -> &RequestSpec {
        &self.request
    }

    /// Response the provider must return.
    #[must_use]
    pub const fn response(&self) -> &ResponseSpec {
        &self.response
    }

    /// Check the interaction is usable.
    ///
    /// # Errors
    ///
    /// Returns a reason when the description is empty, the path example is
    /// not an absolute path, the status is outside 100-599 or a matcher is
    /// invalid. Query and header matchers must accept their example in
    /// text form.
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("interaction description must not be empty".to_string());
        }

        let path = self.request.path.example();
        if !path.as_str().is_some_and(|p| p.starts_with('/')) {
            return Err(format!("request path must be a string starting with '/', got {path}"));
        }
        self.request
            .path
            .validate()
            .map_err(|e| format!("request path: {e}"))?;

        if !(100..=599).contains(&self.response.status) {
            return Err(format!(
                "response status {} is outside 100-599",
                self.response.status
            ));
        }

        let text_nodes = self
            .request
            .headers
            .iter()
            .map(|(name, node)| (format!("request header '{name}'"), node))
            .chain(
                self.request
                    .query
                    .iter()
                    .map(|(name, node)| (format!("query parameter '{name}'"), node)),
            )
            .chain(
                self.response
                    .headers
                    .iter()
                    .map(|(name, node)| (format!("response header '{name}'"), node)),
            );
        for (label, node) in text_nodes {
            node.validate().map_err(|e| format!("{label}: {e}"))?;
            let example = node.example();
            let sent = wire_value(&example);
            if !match_value(node, &sent).ok() {
                return Err(format!(
                    "{label}: values travel as text, example {example} arrives as {sent} and does not match {}",
                    node.describe()
                ));
            }
        }

        let bodies = self
            .request
            .body
            .iter()
            .map(|node| ("request body", node))
            .chain(self.response.body.iter().map(|node| ("response body", node)));
        for (label, node) in bodies {
            node.validate().map_err(|e| format!("{label}: {e}"))?;
        }
        Ok(())
    }
}

/// All interactions one consumer expects from one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    /// Consumer participant
    pub consumer: Participant,
    /// Provider participant
    pub provider: Participant,
    /// Interactions in declaration order
    pub interactions: Vec<Interaction>,
    /// Document format version
    pub format_version: String,
}

impl ContractDocument {
    /// Create a document in the current format version.
    #[must_use]
    pub fn new(
        consumer: impl Into<String>,
        provider: impl Into<String>,
        interactions: Vec<Interaction>,
    ) -> Self {
        Self {
            consumer: Participant::new(consumer),
            provider: Participant::new(provider),
            interactions,
            format_version: FORMAT_VERSION.to_string(),
        }
    }

    /// Parse and validate a document.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::MalformedDocument`] when the JSON is invalid,
    /// a required field is missing, the version is unsupported or an
    /// interaction fails validation.
    pub fn from_json_str(json: &str) -> PactResult<Self> {
        let document: Self =
            serde_json::from_str(json).map_err(|e| PactError::malformed(e.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    /// Check version, participant names and every interaction.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::MalformedDocument`] describing the first problem.
    pub fn validate(&self) -> PactResult<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(PactError::malformed(format!(
                "unsupported format version '{}', expected '{FORMAT_VERSION}'",
                self.format_version
            )));
        }
        if self.consumer.name.trim().is_empty() || self.provider.name.trim().is_empty() {
            return Err(PactError::malformed("consumer and provider names must not be empty"));
        }
        for (index, interaction) in self.interactions.iter().enumerate() {
            interaction
                .validate()
                .map_err(|e| PactError::malformed(format!("interaction {index}: {e}")))?;
        }
        Ok(())
    }

    /// Canonical pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> PactResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
