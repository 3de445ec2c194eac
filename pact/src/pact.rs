//! Consumer-side test fixture.
//!
//! A [`Pact`] collects the interactions a consumer declares, runs each
//! consumer test against a fresh mock server and writes the contract once
//! the interactions have been exercised.

use crate::config::PactConfig;
use crate::contract::{ContractDocument, Interaction};
use crate::error::{PactError, PactResult};
use crate::mock_server::{MockServer, MockServerHandle, TestOutcome};
use crate::store::ContractStore;
use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::panic::{AssertUnwindSafe, resume_unwind};
use tracing::{info, instrument};

/// Contract under construction between one consumer and one provider.
#[derive(Debug)]
pub struct Pact {
    consumer: String,
    provider: String,
    config: PactConfig,
    pending: Vec<Interaction>,
    verified: Vec<Interaction>,
}

impl Pact {
    /// New contract using [`PactConfig::default`].
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::with_config(consumer, provider, PactConfig::default())
    }

    /// New contract with explicit configuration.
    #[must_use]
    pub fn with_config(
        consumer: impl Into<String>,
        provider: impl Into<String>,
        config: PactConfig,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            config,
            pending: Vec::new(),
            verified: Vec::new(),
        }
    }

    /// Register an interaction for the next test.
    pub fn interaction(&mut self, interaction: Interaction) -> &mut Self {
        self.pending.push(interaction);
        self
    }

    /// Interactions registered but not yet run.
    #[must_use]
    pub fn pending(&self) -> &[Interaction] {
        &self.pending
    }

    /// Document holding every interaction verified so far.
    #[must_use]
    pub fn contract(&self) -> ContractDocument {
        ContractDocument::new(
            self.consumer.clone(),
            self.provider.clone(),
            self.verified.clone(),
        )
    }

    /// Run one consumer test against a mock server.
    ///
    /// Pending interactions are handed to a new mock server and `test` is
    /// called once with its handle. The server is shut down before any
    /// failure propagates; a panic inside `test` is resumed afterwards.
    /// When the session passes, its interactions join the contract and the
    /// contract is written if enabled.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::TestFailed`] if `test` returns an error, or
    /// the error from starting, ending or saving.
    #[instrument(skip(self, test), fields(consumer = %self.consumer, provider = %self.provider))]
    pub async fn run_test<F, Fut, E>(&mut self, test: F) -> PactResult<TestOutcome>
    where
        F: FnOnce(MockServerHandle) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let interactions = std::mem::take(&mut self.pending);
        let server = MockServer::start(interactions.clone(), &self.config).await?;

        let result = AssertUnwindSafe(test(server.handle())).catch_unwind().await;
        let outcome = server.end().await;

        match result {
            Err(panic) => resume_unwind(panic),
            Ok(Err(e)) => return Err(PactError::TestFailed(e.to_string())),
            Ok(Ok(())) => {}
        }

        let outcome = outcome?;
        if outcome.ok {
            self.verified.extend(interactions);
            if self.config.write_contracts {
                let path = ContractStore::from_config(&self.config).save(&self.contract())?;
                info!(path = %path.display(), "Consumer test passed");
            }
        }
        Ok(outcome)
    }
}
