//! Provider verifier: replays contract documents against a running provider.
//!
//! Interactions are replayed in document order. Each one is set up through
//! the [`StateHandler`], sent with example values in place of matchers and
//! its response checked by the match engine. A failing interaction never
//! stops the run.

use crate::config::PactConfig;
use crate::contract::{ContractDocument, Interaction, Method};
use crate::error::{PactError, PactResult};
use crate::matching::{ActualRequest, ActualResponse, match_response, parse_body};
use crate::store::ContractStore;
use crate::verification::{InteractionOutcome, InteractionResult, VerificationReport};
use async_trait::async_trait;
use pact_common::{CommonError, build_http_client};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument, warn};
use url::Url;

/// Puts the provider into a named state before an interaction is replayed.
#[async_trait]
pub trait StateHandler: Send + Sync {
    /// Prepare the provider for `state`.
    async fn set_up(&self, state: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> StateHandler for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    async fn set_up(&self, state: &str) -> anyhow::Result<()> {
        self(state)
    }
}

/// State handler for providers without state setup; accepts every state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProviderStates;

#[async_trait]
impl StateHandler for NoProviderStates {
    async fn set_up(&self, _state: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Replays contracts against a provider over HTTP.
#[derive(Debug, Clone)]
pub struct ProviderVerifier {
    client: Client,
    expected_provider: Option<String>,
}

impl ProviderVerifier {
    /// Verifier using the configured per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &PactConfig) -> PactResult<Self> {
        config.validate()?;
        let client =
            build_http_client(&config.http_config()).map_err(CommonError::from_reqwest)?;
        Ok(Self {
            client,
            expected_provider: None,
        })
    }

    /// Only accept documents written for `provider`.
    #[must_use]
    pub fn for_provider(mut self, provider: impl Into<String>) -> Self {
        self.expected_provider = Some(provider.into());
        self
    }

    /// Replay every interaction of `document` against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::MalformedDocument`] if the document fails
    /// validation, or [`PactError::Configuration`] if the base URL is invalid
    /// or the document names another provider. Nothing is sent in either
    /// case. Per-interaction failures are recorded in the report.
    #[instrument(
        skip(self, document, handler),
        fields(consumer = %document.consumer.name, provider = %document.provider.name)
    )]
    pub async fn verify<H>(
        &self,
        document: &ContractDocument,
        base_url: &str,
        handler: &H,
    ) -> PactResult<VerificationReport>
    where
        H: StateHandler + ?Sized,
    {
        document.validate()?;
        let base = parse_base_url(base_url)?;
        if let Some(expected) = &self.expected_provider {
            if expected != &document.provider.name {
                return Err(PactError::configuration(format!(
                    "contract is for provider '{}', expected '{expected}'",
                    document.provider.name
                )));
            }
        }

        let mut results = Vec::with_capacity(document.interactions.len());
        for interaction in &document.interactions {
            results.push(self.verify_interaction(interaction, &base, handler).await);
        }

        let report = VerificationReport {
            consumer: document.consumer.name.clone(),
            provider: document.provider.name.clone(),
            results,
        };
        if report.passed() {
            info!(interactions = report.results.len(), "Provider verification passed");
        } else {
            warn!(
                interactions = report.results.len(),
                failed = report.failures().count(),
                "Provider verification failed"
            );
        }
        Ok(report)
    }

    /// Load each contract file and verify it.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be loaded, or on a configuration
    /// error, before any interaction of that file is replayed.
    pub async fn verify_files<P, H>(
        &self,
        paths: &[P],
        base_url: &str,
        handler: &H,
    ) -> PactResult<Vec<VerificationReport>>
    where
        P: AsRef<Path>,
        H: StateHandler + ?Sized,
    {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            let document = ContractStore::load(path)?;
            reports.push(self.verify(&document, base_url, handler).await?);
        }
        Ok(reports)
    }

    async fn verify_interaction<H>(
        &self,
        interaction: &Interaction,
        base: &Url,
        handler: &H,
    ) -> InteractionResult
    where
        H: StateHandler + ?Sized,
    {
        let outcome = self.replay(interaction, base, handler).await;
        match &outcome {
            InteractionOutcome::Passed => {
                info!(interaction = %interaction.description(), "Interaction verified");
            }
            InteractionOutcome::Mismatched(diffs) => warn!(
                interaction = %interaction.description(),
                mismatches = diffs.len(),
                "Response did not match"
            ),
            InteractionOutcome::StateSetupFailed(reason) => warn!(
                interaction = %interaction.description(),
                error = %reason,
                "Provider state setup failed"
            ),
            InteractionOutcome::NetworkError { message, timed_out } => warn!(
                interaction = %interaction.description(),
                error = %message,
                timed_out,
                "Request to provider failed"
            ),
        }
        InteractionResult {
            description: interaction.description().to_string(),
            provider_state: interaction.provider_state().map(str::to_string),
            outcome,
        }
    }

    async fn replay<H>(&self, interaction: &Interaction, base: &Url, handler: &H) -> InteractionOutcome
    where
        H: StateHandler + ?Sized,
    {
        if let Some(state) = interaction.provider_state() {
            if let Err(e) = handler.set_up(state).await {
                return InteractionOutcome::StateSetupFailed(format!("{e:#}"));
            }
        }

        let example = ActualRequest::from_example(interaction.request());
        let url = request_url(base, &example);
        let mut request = self
            .client
            .request(http_method(interaction.request().method), url);
        for (name, value) in &example.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &example.body {
            let declared = example.headers.get(CONTENT_TYPE.as_str());
            request = match body {
                serde_json::Value::String(text) if declared.is_some_and(|v| !v.contains("json")) => {
                    request.body(text.clone())
                }
                other => {
                    if declared.is_none() {
                        request = request.header(CONTENT_TYPE, "application/json");
                    }
                    request.body(other.to_string())
                }
            };
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return network_error(e),
        };
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return network_error(e),
        };

        let actual = ActualResponse {
            status,
            headers,
            body: parse_body(&bytes),
        };
        let diffs = match_response(interaction.response(), &actual);
        if diffs.is_empty() {
            InteractionOutcome::Passed
        } else {
            InteractionOutcome::Mismatched(diffs)
        }
    }
}

/// Verify a document with the default configuration.
///
/// # Errors
///
/// See [`ProviderVerifier::verify`].
pub async fn verify_provider<H>(
    document: &ContractDocument,
    base_url: &str,
    handler: &H,
) -> PactResult<VerificationReport>
where
    H: StateHandler + ?Sized,
{
    ProviderVerifier::new(&PactConfig::default())?
        .verify(document, base_url, handler)
        .await
}

fn parse_base_url(base_url: &str) -> PactResult<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| PactError::configuration(format!("invalid provider URL '{base_url}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PactError::configuration(format!(
            "provider URL must use http or https, got '{base_url}'"
        )));
    }
    Ok(url)
}

/// Base URL path joined with the example path, plus example query pairs.
fn request_url(base: &Url, example: &ActualRequest) -> Url {
    let mut url = base.clone();
    url.set_path(&format!("{}{}", base.path().trim_end_matches('/'), example.path));
    url.set_query(None);
    let pairs = example.query_pairs();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}

const fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let values: Vec<&str> = headers
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();
            (name.as_str().to_string(), values.join(", "))
        })
        .collect()
}

fn network_error(err: reqwest::Error) -> InteractionOutcome {
    let err = CommonError::from_reqwest(err);
    InteractionOutcome::NetworkError {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::InteractionBuilder;
    use crate::matchers::{integer, like, object};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn get_project(id: i64, state: Option<&str>) -> Interaction {
        let mut builder = InteractionBuilder::new(format!("a request for project {id}"))
            .with_request(Method::Get, format!("/projects/{id}").as_str())
            .request_header("Accept", "application/json")
            .will_respond_with(200)
            .response_body(object([
                ("id", integer(id)),
                ("name", like("Project Alpha")),
                ("completed", like(false)),
            ]));
        if let Some(state) = state {
            builder = builder.given(state);
        }
        builder.build().unwrap()
    }

    fn document(interactions: Vec<Interaction>) -> ContractDocument {
        ContractDocument::new("todo-web", "todo-api", interactions)
    }

    fn verifier() -> ProviderVerifier {
        ProviderVerifier::new(&PactConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_matching_provider_passes() {
        let provider = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/1"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 1, "name": "Renamed", "completed": true})),
            )
            .mount(&provider)
            .await;

        let report = verifier()
            .verify(&document(vec![get_project(1, None)]), &provider.uri(), &NoProviderStates)
            .await
            .unwrap();
        assert!(report.passed(), "{report}");
    }

    #[tokio::test]
    async fn test_mismatch_reports_path() {
        let provider = MockServer::start().await;
        Mock::given(path("/projects/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "1", "name": "Project Alpha", "completed": false})),
            )
            .mount(&provider)
            .await;

        let report = verifier()
            .verify(&document(vec![get_project(1, None)]), &provider.uri(), &NoProviderStates)
            .await
            .unwrap();
        assert!(!report.passed());
        let diffs = report.results[0].diffs();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].diff.path, ".id");
    }

    #[tokio::test]
    async fn test_state_handler_called_before_request() {
        let provider = MockServer::start().await;
        Mock::given(path("/projects/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 1, "name": "a", "completed": false})),
            )
            .expect(1)
            .mount(&provider)
            .await;

        let seen = Mutex::new(Vec::new());
        let handler = |state: &str| -> anyhow::Result<()> {
            seen.lock().push(state.to_string());
            Ok(())
        };
        let report = verifier()
            .verify(
                &document(vec![get_project(1, Some("project with id 1 exists"))]),
                &provider.uri(),
                &handler,
            )
            .await
            .unwrap();

        assert!(report.passed(), "{report}");
        assert_eq!(*seen.lock(), vec!["project with id 1 exists".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_state_setup_does_not_stop_run() {
        let provider = MockServer::start().await;
        Mock::given(path("/projects/2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 2, "name": "b", "completed": false})),
            )
            .mount(&provider)
            .await;

        let handler = |state: &str| -> anyhow::Result<()> {
            if state == "broken" {
                anyhow::bail!("fixture unavailable");
            }
            Ok(())
        };
        let report = verifier()
            .verify(
                &document(vec![
                    get_project(1, Some("broken")),
                    get_project(2, Some("project with id 2 exists")),
                ]),
                &provider.uri(),
                &handler,
            )
            .await
            .unwrap();

        assert!(!report.passed());
        assert!(report.results[0].state_setup_failed());
        assert!(report.results[1].passed(), "{report}");
        assert_eq!(provider.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_built_from_examples() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects"))
            .and(query_param("dryRun", "false"))
            .and(body_json(json!({"name": "Project Beta"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&provider)
            .await;

        let interaction = InteractionBuilder::new("create a project")
            .with_request(Method::Post, "/projects")
            .query_param("dryRun", "false")
            .request_body(object([("name", like("Project Beta"))]))
            .will_respond_with(201)
            .build()
            .unwrap();
        let base = format!("{}/api/", provider.uri());
        let report = verifier()
            .verify(&document(vec![interaction]), &base, &NoProviderStates)
            .await
            .unwrap();
        assert!(report.passed(), "{report}");
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_interaction() {
        let provider = MockServer::start().await;
        Mock::given(path("/projects/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 1, "name": "a", "completed": false}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&provider)
            .await;
        Mock::given(path("/projects/2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 2, "name": "b", "completed": false})),
            )
            .mount(&provider)
            .await;

        let config = PactConfig::default().with_verification_timeout(Duration::from_millis(300));
        let report = ProviderVerifier::new(&config)
            .unwrap()
            .verify(
                &document(vec![get_project(1, None), get_project(2, None)]),
                &provider.uri(),
                &NoProviderStates,
            )
            .await
            .unwrap();

        assert!(matches!(
            report.results[0].outcome,
            InteractionOutcome::NetworkError { timed_out: true, .. }
        ));
        assert!(report.results[1].passed(), "{report}");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_recorded() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let report = verifier()
            .verify(&document(vec![get_project(1, None)]), &format!("http://{addr}"), &NoProviderStates)
            .await
            .unwrap();
        assert!(matches!(
            report.results[0].outcome,
            InteractionOutcome::NetworkError { timed_out: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_provider_name_mismatch_is_configuration_error() {
        let result = verifier()
            .for_provider("billing-api")
            .verify(&document(vec![]), "http://127.0.0.1:1", &NoProviderStates)
            .await;
        assert!(matches!(result, Err(PactError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unsupported_version_stops_before_any_request() {
        let provider = MockServer::start().await;
        Mock::given(path("/projects/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&provider)
            .await;

        let mut doc = document(vec![get_project(1, None)]);
        doc.format_version = "9.9".to_string();
        let result = verifier()
            .verify(&doc, &provider.uri(), &NoProviderStates)
            .await;

        assert!(matches!(result, Err(PactError::MalformedDocument(ref msg)) if msg.contains("9.9")));
        assert!(provider.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_document_is_validated() {
        let provider = MockServer::start().await;
        let mut doc = document(vec![get_project(1, Some("project with id 1 exists"))]);
        doc.provider.name = String::new();

        let states = Mutex::new(Vec::new());
        let handler = |state: &str| -> anyhow::Result<()> {
            states.lock().push(state.to_string());
            Ok(())
        };
        let result = verify_provider(&doc, &provider.uri(), &handler).await;

        assert!(matches!(result, Err(PactError::MalformedDocument(_))));
        assert!(result.is_err_and(|e| e.is_fatal()));
        assert!(states.lock().is_empty());
        assert!(provider.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_configuration_error() {
        let result = verifier()
            .verify(&document(vec![]), "localhost:8080", &NoProviderStates)
            .await;
        assert!(matches!(result, Err(PactError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_verify_files() {
        let provider = MockServer::start().await;
        Mock::given(path("/projects/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 1, "name": "a", "completed": false})),
            )
            .mount(&provider)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let saved = ContractStore::new(dir.path())
            .save(&document(vec![get_project(1, None)]))
            .unwrap();

        let reports = verifier()
            .for_provider("todo-api")
            .verify_files(&[saved], &provider.uri(), &NoProviderStates)
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].passed(), "{}", reports[0]);
    }
}
