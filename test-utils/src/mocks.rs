//! Mock provider state handlers for testing.

use async_trait::async_trait;
use pact_engine::StateHandler;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// State handler that records every state it is asked to set up.
#[derive(Debug, Clone, Default)]
pub struct RecordingStateHandler {
    calls: Arc<RwLock<Vec<String>>>,
    failing: HashSet<String>,
}

impl RecordingStateHandler {
    /// Create a handler that accepts every state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make set-up of `state` fail.
    #[must_use]
    pub fn failing_on(mut self, state: impl Into<String>) -> Self {
        self.failing.insert(state.into());
        self
    }

    /// States requested so far, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    /// Number of set-up calls.
    pub async fn count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Forget recorded calls.
    pub async fn clear(&self) {
        self.calls.write().await.clear();
    }
}

#[async_trait]
impl StateHandler for RecordingStateHandler {
    async fn set_up(&self, state: &str) -> anyhow::Result<()> {
        self.calls.write().await.push(state.to_string());
        if self.failing.contains(state) {
            anyhow::bail!("state '{state}' could not be set up");
        }
        Ok(())
    }
}
