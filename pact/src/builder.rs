//! Consuming builder for interactions.
//!
//! Every step takes the builder by value and returns a new one; problems
//! are reported once, by [`InteractionBuilder::build`].
//!
//! ```
//! use pact_engine::{InteractionBuilder, Method, matchers::{each_like, integer, like, object}};
//!
//! let interaction = InteractionBuilder::new("a request for projects")
//!     .with_request(Method::Get, "/projects")
//!     .request_header("Accept", "application/json")
//!     .will_respond_with(200)
//!     .response_body(each_like(object([("id", integer(1)), ("name", like("Project Alpha"))]), 1))
//!     .build()
//!     .unwrap();
//! assert_eq!(interaction.description(), "a request for projects");
//! ```

use crate::contract::{Interaction, Method, RequestSpec, ResponseSpec};
use crate::error::{PactError, PactResult};
use crate::matchers::MatcherNode;
use std::collections::BTreeMap;

/// Builder producing one [`Interaction`].
#[derive(Debug, Clone)]
#[must_use]
pub struct InteractionBuilder {
    description: String,
    provider_state: Option<String>,
    method: Method,
    path: MatcherNode,
    request_headers: BTreeMap<String, MatcherNode>,
    query: BTreeMap<String, MatcherNode>,
    request_body: Option<MatcherNode>,
    status: u16,
    response_headers: BTreeMap<String, MatcherNode>,
    response_body: Option<MatcherNode>,
}

/// Start declaring an interaction, optionally under a provider state.
pub fn declare_interaction(description: &str, provider_state: Option<&str>) -> InteractionBuilder {
    let builder = InteractionBuilder::new(description);
    match provider_state {
        Some(state) => builder.given(state),
        None => builder,
    }
}

impl InteractionBuilder {
    /// New builder for `GET /` answered with 200.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            provider_state: None,
            method: Method::Get,
            path: MatcherNode::from("/"),
            request_headers: BTreeMap::new(),
            query: BTreeMap::new(),
            request_body: None,
            status: 200,
            response_headers: BTreeMap::new(),
            response_body: None,
        }
    }

    /// Provider state the interaction requires.
    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.provider_state = Some(state.into());
        self
    }

    /// Replace the description.
    pub fn upon_receiving(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Expected method and path. The path may be a matcher.
    pub fn with_request(mut self, method: Method, path: impl Into<MatcherNode>) -> Self {
        self.method = method;
        self.path = path.into();
        self
    }

    /// Expected request header. Names are case-insensitive.
    pub fn request_header(mut self, name: &str, value: impl Into<MatcherNode>) -> Self {
        self.request_headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Expected query parameter.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<MatcherNode>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Expected request body.
    pub fn request_body(mut self, body: impl Into<MatcherNode>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    /// Status the provider answers with.
    pub const fn will_respond_with(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Response header. Names are case-insensitive.
    pub fn response_header(mut self, name: &str, value: impl Into<MatcherNode>) -> Self {
        self.response_headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Response body.
    pub fn response_body(mut self, body: impl Into<MatcherNode>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    /// Finish the interaction.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Configuration`] for an empty description, a path
    /// not starting with `/`, a status outside 100-599, an invalid regex or
    /// an example that does not satisfy its own matcher.
    pub fn build(self) -> PactResult<Interaction> {
        let interaction = Interaction::from_parts(
            self.description,
            self.provider_state,
            RequestSpec {
                method: self.method,
                path: self.path,
                headers: self.request_headers,
                query: self.query,
                body: self.request_body,
            },
            ResponseSpec {
                status: self.status,
                headers: self.response_headers,
                body: self.response_body,
            },
        );
        interaction.validate().map_err(|reason| {
            PactError::configuration(format!(
                "invalid interaction '{}': {reason}",
                interaction.description()
            ))
        })?;
        Ok(interaction)
    }
}
