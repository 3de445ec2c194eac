//! Test fixtures for the Todo consumer/provider pair.

use pact_engine::matchers::{each_like, integer, like, object};
use pact_engine::{Interaction, InteractionBuilder, MatcherNode, Method};
use serde_json::{Value, json};

/// Consumer name used by the fixtures.
pub const CONSUMER: &str = "todo-web";

/// Provider name used by the fixtures.
pub const PROVIDER: &str = "todo-api";

/// Provider state for the single-project fixture.
pub const PROJECT_EXISTS: &str = "project with id 1 exists";

/// Provider state for the missing-project fixture.
pub const PROJECT_MISSING: &str = "project with id 999 does not exist";

/// Matcher for one project object.
#[must_use]
pub fn project_matcher() -> MatcherNode {
    object([
        ("id", integer(1)),
        ("name", like("Project Alpha")),
        ("completed", like(false)),
    ])
}

/// `GET /projects` answered with a list of projects.
#[must_use]
pub fn list_projects() -> Interaction {
    build(
        InteractionBuilder::new("a request for all projects")
            .with_request(Method::Get, "/projects")
            .request_header("Accept", "application/json")
            .will_respond_with(200)
            .response_header("Content-Type", "application/json")
            .response_body(each_like(project_matcher(), 1)),
    )
}

/// `GET /projects/1` given that the project exists.
#[must_use]
pub fn get_project() -> Interaction {
    build(
        InteractionBuilder::new("a request for project 1")
            .given(PROJECT_EXISTS)
            .with_request(Method::Get, "/projects/1")
            .request_header("Accept", "application/json")
            .will_respond_with(200)
            .response_body(project_matcher()),
    )
}

/// `GET /projects/999` answered with 404.
#[must_use]
pub fn missing_project() -> Interaction {
    build(
        InteractionBuilder::new("a request for a project that does not exist")
            .given(PROJECT_MISSING)
            .with_request(Method::Get, "/projects/999")
            .will_respond_with(404),
    )
}

/// JSON body a provider would return for one project.
#[must_use]
pub fn project_json(id: i64, name: &str, completed: bool) -> Value {
    json!({ "id": id, "name": name, "completed": completed })
}

fn build(builder: InteractionBuilder) -> Interaction {
    builder
        .build()
        .unwrap_or_else(|e| panic!("fixture interaction is invalid: {e}"))
}
