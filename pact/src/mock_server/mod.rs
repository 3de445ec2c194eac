//! Ephemeral HTTP mock server for one consumer test.
//!
//! Lifecycle: `Created -> Listening -> Verifying -> Closed`. [`MockServer::start`]
//! returns once the listener is bound; [`MockServer::end`] stops accepting,
//! waits for in-flight requests and produces the [`TestOutcome`]. Dropping
//! a server without ending it still stops the listener and releases the port.

mod handler;
mod session;

pub use session::{NearestMiss, RepeatedInteraction, TestOutcome, UnmatchedRequest};

use crate::config::PactConfig;
use crate::contract::Interaction;
use crate::error::{PactError, PactResult};
use axum::Router;
use session::Session;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// How long `end` waits for in-flight requests before aborting the listener.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state of a mock server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Interactions registered, nothing bound yet
    Created,
    /// Accepting requests
    Listening,
    /// Listener stopped, outcome being computed
    Verifying,
    /// Port released
    Closed,
}

/// What the guest client needs to reach the mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerHandle {
    url: String,
}

impl MockServerHandle {
    /// Base URL, e.g. `http://127.0.0.1:49152`.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Absolute URL for a path on the mock server.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.url)
        } else {
            format!("{}/{path}", self.url)
        }
    }
}

/// A running mock server session.
#[derive(Debug)]
pub struct MockServer {
    id: Uuid,
    addr: SocketAddr,
    session: Arc<Session>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<io::Result<()>>>,
    state: ServerState,
}

impl MockServer {
    /// Register interactions and start listening on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Configuration`] if two interactions accept the
    /// same request, or [`PactError::Server`] if the listener cannot bind.
    #[instrument(skip(interactions, config), fields(interactions = interactions.len()))]
    pub async fn start(interactions: Vec<Interaction>, config: &PactConfig) -> PactResult<Self> {
        session::check_overlaps(&interactions)?;
        let session = Arc::new(Session::new(interactions));
        let id = Uuid::new_v4();

        let listener = TcpListener::bind((config.mock_host, 0))
            .await
            .map_err(|e| PactError::server(format!("failed to bind {}: {e}", config.mock_host)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| PactError::server(format!("failed to read bound address: {e}")))?;

        let app = Router::new()
            .fallback(handler::handle)
            .with_state(Arc::clone(&session));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(server = %id, %addr, interactions = session.len(), "Mock server listening");
        Ok(Self {
            id,
            addr,
            session,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            state: ServerState::Listening,
        })
    }

    /// Handle for the guest client.
    #[must_use]
    pub fn handle(&self) -> MockServerHandle {
        MockServerHandle { url: self.url() }
    }

    /// Base URL of the listener.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bound socket address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Stop listening, wait for in-flight requests and verify the session.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Configuration`] if a request matched several
    /// interactions.
    #[instrument(skip(self), fields(server = %self.id))]
    pub async fn end(mut self) -> PactResult<TestOutcome> {
        self.stop().await;
        self.state = ServerState::Verifying;

        let outcome = self.session.outcome();
        self.state = ServerState::Closed;

        match &outcome {
            Ok(outcome) if outcome.ok => info!("Mock server verification passed"),
            Ok(outcome) => warn!(
                unmatched = outcome.unmatched_requests.len(),
                unused = outcome.unused_interactions.len(),
                repeated = outcome.repeated_interactions.len(),
                "Mock server verification failed"
            ),
            Err(e) => warn!(error = %e, "Mock server session was ambiguous"),
        }
        outcome
    }

    async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "Mock server stopped with an error"),
            Ok(Err(e)) => warn!(error = %e, "Mock server task failed"),
            Err(_) => {
                warn!("Shutdown timeout reached, aborting mock server");
                task.abort();
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::InteractionBuilder;
    use crate::contract::Method;
    use crate::matchers::{each_like, integer, like, object, regex};
    use serde_json::{Value, json};

    fn list_projects() -> Interaction {
        InteractionBuilder::new("a request for projects")
            .with_request(Method::Get, "/projects")
            .request_header("Accept", "application/json")
            .will_respond_with(200)
            .response_body(each_like(
                object([
                    ("id", integer(1)),
                    ("name", like("Project Alpha")),
                    ("completed", like(false)),
                ]),
                1,
            ))
            .build()
            .unwrap()
    }

    fn create_project() -> Interaction {
        InteractionBuilder::new("a request to create a project")
            .with_request(Method::Post, "/projects")
            .request_body(object([("name", like("Project Beta"))]))
            .will_respond_with(201)
            .response_header("Location", regex(r"/projects/\d+", "/projects/2"))
            .build()
            .unwrap()
    }

    async fn start(interactions: Vec<Interaction>) -> MockServer {
        MockServer::start(interactions, &PactConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_matched_request_gets_programmed_response() {
        let server = start(vec![list_projects()]).await;
        assert_eq!(server.state(), ServerState::Listening);

        let response = reqwest::Client::new()
            .get(server.handle().url_for("/projects"))
            .header("Accept", "application/json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/json");
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!([{"id": 1, "name": "Project Alpha", "completed": false}])
        );

        let outcome = server.end().await.unwrap();
        assert!(outcome.ok, "{outcome}");
    }

    #[tokio::test]
    async fn test_request_body_and_response_headers() {
        let server = start(vec![create_project()]).await;
        let response = reqwest::Client::new()
            .post(server.handle().url_for("projects"))
            .json(&json!({"name": "Something else", "extra": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        assert_eq!(response.headers()["location"], "/projects/2");
        assert!(server.end().await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_unmatched_request_gets_500_and_fails_session() {
        let server = start(vec![list_projects()]).await;
        let response = reqwest::get(server.handle().url_for("/projects"))
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["nearestInteraction"], "a request for projects");
        let mismatch = body["mismatches"][0].as_str().unwrap();
        assert!(mismatch.starts_with("header.accept: expected \"application/json\""));

        let outcome = server.end().await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.unmatched_requests.len(), 1);
        assert_eq!(outcome.unused_interactions.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_body_is_recorded_as_unmatched() {
        let server = start(vec![create_project()]).await;
        let _ = reqwest::Client::new()
            .post(server.handle().url_for("/projects"))
            .body(vec![b'a'; handler::MAX_BODY_BYTES + 1])
            .send()
            .await;

        let outcome = server.end().await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.unmatched_requests.len(), 1);
        let rejected = &outcome.unmatched_requests[0];
        assert_eq!(rejected.method, "POST");
        assert_eq!(rejected.path, "/projects");
        assert!(rejected.reason.as_deref().is_some_and(|r| r.contains("request body")));
    }

    #[tokio::test]
    async fn test_numeric_query_value_matched_as_text() {
        let page = InteractionBuilder::new("a page of projects")
            .with_request(Method::Get, "/projects")
            .query_param("page", regex(r"\d+", "2"))
            .build()
            .unwrap();
        let server = start(vec![page]).await;

        let response = reqwest::get(server.handle().url_for("/projects?page=7"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(server.end().await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_unused_interaction_fails_session() {
        let server = start(vec![list_projects(), create_project()]).await;
        reqwest::Client::new()
            .get(server.handle().url_for("/projects"))
            .header("Accept", "application/json")
            .send()
            .await
            .unwrap();

        let outcome = server.end().await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.unmatched_requests.len(), 0);
        assert_eq!(
            outcome.unused_interactions[0].description(),
            "a request to create a project"
        );
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_counted() {
        let get = |n: i64| {
            InteractionBuilder::new(format!("project {n}"))
                .with_request(Method::Get, format!("/projects/{n}").as_str())
                .response_body(object([("id", integer(n))]))
                .build()
                .unwrap()
        };
        let server = start((1..=8).map(get).collect()).await;
        let client = reqwest::Client::new();

        let requests = (1..=8).map(|n| {
            let request = client.get(server.handle().url_for(&format!("/projects/{n}")));
            async move { request.send().await.unwrap().status() }
        });
        let statuses = futures::future::join_all(requests).await;
        assert!(statuses.iter().all(|s| *s == 200));
        assert!(server.end().await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_overlapping_interactions_rejected_before_binding() {
        let result = MockServer::start(vec![list_projects(), list_projects()], &PactConfig::default()).await;
        assert!(matches!(result, Err(PactError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_port_released_after_end() {
        let server = start(vec![list_projects()]).await;
        let addr = server.addr();
        server.end().await.unwrap();
        assert!(TcpListener::bind(addr).await.is_ok());
    }

    #[tokio::test]
    async fn test_port_released_on_drop() {
        let server = start(vec![list_projects()]).await;
        let url = server.handle().url_for("/projects");
        drop(server);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(reqwest::get(url).await.is_err());
    }
}
