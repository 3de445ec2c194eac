//! Request handler: resolves each request against the session and answers
//! with the programmed response.

use super::session::{Dispatch, Session};
use crate::contract::ResponseSpec;
use crate::matching::{ActualRequest, parse_body};
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

/// Largest request body the mock server reads.
pub(super) const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub(crate) async fn handle(State(session): State<Arc<Session>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let reason = format!("failed to read request body: {e}");
            let rejected = session.reject(parts.method.as_str(), parts.uri.path(), reason.clone());
            return error_response(json!({
                "error": reason,
                "method": rejected.method,
                "path": rejected.path,
            }));
        }
    };

    let mut actual = ActualRequest::new(parts.method.as_str(), parts.uri.path());
    if let Some(query) = parts.uri.query() {
        actual = actual.with_query_string(query);
    }
    for name in parts.headers.keys() {
        let values: Vec<&str> = parts
            .headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        actual = actual.with_header(name.as_str(), values.join(", "));
    }
    let actual = actual.with_body(parse_body(&bytes));

    match session.dispatch(&actual) {
        Dispatch::Matched(index) => match session.interaction(index) {
            Some(interaction) => programmed_response(interaction.response()),
            None => error_response(json!({ "error": "matched interaction disappeared" })),
        },
        Dispatch::Unmatched(unmatched) => {
            let (nearest, mismatches): (Value, Vec<String>) = match &unmatched.nearest {
                Some(nearest) => (
                    Value::String(nearest.description.clone()),
                    nearest.diffs.iter().map(ToString::to_string).collect(),
                ),
                None => (Value::Null, Vec::new()),
            };
            error_response(json!({
                "error": "Unexpected request",
                "method": unmatched.method,
                "path": unmatched.path,
                "nearestInteraction": nearest,
                "mismatches": mismatches,
            }))
        }
        Dispatch::Ambiguous(candidates) => error_response(json!({
            "error": "Request matched more than one interaction",
            "method": actual.method,
            "path": actual.path,
            "interactions": candidates,
        })),
    }
}

/// Status, headers and a body synthesized from example values.
fn programmed_response(spec: &ResponseSpec) -> Response {
    let status = StatusCode::from_u16(spec.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    for (name, node) in &spec.headers {
        let value = match node.example() {
            Value::String(s) => s,
            other => other.to_string(),
        };
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping response header that is not valid HTTP"),
        }
    }

    let body = match &spec.body {
        None => Body::empty(),
        Some(node) => {
            let example = node.example();
            let declared_json = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_none_or(|v| v.contains("json"));
            match example {
                Value::String(text) if !declared_json => Body::from(text),
                other => {
                    headers
                        .entry(header::CONTENT_TYPE)
                        .or_insert(HeaderValue::from_static("application/json"));
                    Body::from(other.to_string())
                }
            }
        }
    };

    (status, headers, body).into_response()
}

fn error_response(body: Value) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body.to_string(),
    )
        .into_response()
}
