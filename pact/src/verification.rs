//! Provider verification results.

use crate::matching::HttpMismatch;
use std::fmt;

/// Outcome of replaying one interaction against a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    /// Response matched
    Passed,
    /// Response did not match
    Mismatched(Vec<HttpMismatch>),
    /// The state handler failed; no request was sent
    StateSetupFailed(String),
    /// The request could not be completed
    NetworkError {
        /// Transport error message
        message: String,
        /// Whether the per-request timeout elapsed
        timed_out: bool,
    },
}

/// Result for one interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResult {
    /// Interaction description
    pub description: String,
    /// Provider state the interaction required
    pub provider_state: Option<String>,
    /// What happened
    pub outcome: InteractionOutcome,
}

impl InteractionResult {
    /// Check if the interaction passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.outcome, InteractionOutcome::Passed)
    }

    /// Response mismatches, empty unless the response was received.
    #[must_use]
    pub fn diffs(&self) -> &[HttpMismatch] {
        match &self.outcome {
            InteractionOutcome::Mismatched(diffs) => diffs,
            _ => &[],
        }
    }

    /// Check if the state handler failed.
    #[must_use]
    pub const fn state_setup_failed(&self) -> bool {
        matches!(self.outcome, InteractionOutcome::StateSetupFailed(_))
    }
}

impl fmt::Display for InteractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.description)?;
        if let Some(state) = &self.provider_state {
            write!(f, " given '{state}'")?;
        }
        match &self.outcome {
            InteractionOutcome::Passed => write!(f, ": passed"),
            InteractionOutcome::Mismatched(diffs) => {
                write!(f, ": response mismatch")?;
                for diff in diffs {
                    write!(f, "\n      {diff}")?;
                }
                Ok(())
            }
            InteractionOutcome::StateSetupFailed(reason) => {
                write!(f, ": provider state setup failed: {reason}")
            }
            InteractionOutcome::NetworkError { message, timed_out: true } => {
                write!(f, ": request timed out: {message}")
            }
            InteractionOutcome::NetworkError { message, .. } => {
                write!(f, ": request failed: {message}")
            }
        }
    }
}

/// Verification of one contract document against one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Consumer name
    pub consumer: String,
    /// Provider name
    pub provider: String,
    /// Results in document order
    pub results: Vec<InteractionResult>,
}

impl VerificationReport {
    /// Check if every interaction passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(InteractionResult::passed)
    }

    /// Results that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &InteractionResult> {
        self.results.iter().filter(|result| !result.passed())
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        write!(
            f,
            "verification of {} against {}: {} interaction(s), {failed} failed",
            self.consumer,
            self.provider,
            self.results.len()
        )?;
        for result in self.failures() {
            write!(f, "\n  {result}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{PathedMismatch, Section};
    use serde_json::json;

    fn result(description: &str, outcome: InteractionOutcome) -> InteractionResult {
        InteractionResult {
            description: description.to_string(),
            provider_state: None,
            outcome,
        }
    }

    #[test]
    fn test_empty_report_passes() {
        let report = VerificationReport {
            consumer: "todo-web".to_string(),
            provider: "todo-api".to_string(),
            results: vec![],
        };
        assert!(report.passed());
    }

    #[test]
    fn test_one_failure_fails_report() {
        let diff = HttpMismatch {
            section: Section::Body,
            diff: PathedMismatch {
                path: ".id".to_string(),
                expected: "an integer".to_string(),
                actual: Some(json!("1")),
            },
        };
        let report = VerificationReport {
            consumer: "todo-web".to_string(),
            provider: "todo-api".to_string(),
            results: vec![
                result("list", InteractionOutcome::Passed),
                result("one", InteractionOutcome::Mismatched(vec![diff])),
            ],
        };

        assert!(!report.passed());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.results[1].diffs().len(), 1);
        assert_eq!(
            report.to_string(),
            "verification of todo-web against todo-api: 2 interaction(s), 1 failed\n  \
             'one': response mismatch\n      body.id: expected an integer, got \"1\""
        );
    }

    #[test]
    fn test_state_and_network_failures() {
        let setup = InteractionResult {
            provider_state: Some("project with id 1 exists".to_string()),
            ..result("one", InteractionOutcome::StateSetupFailed("db down".to_string()))
        };
        assert!(setup.state_setup_failed());
        assert!(setup.diffs().is_empty());
        assert_eq!(
            setup.to_string(),
            "'one' given 'project with id 1 exists': provider state setup failed: db down"
        );

        let timeout = result(
            "slow",
            InteractionOutcome::NetworkError {
                message: "deadline elapsed".to_string(),
                timed_out: true,
            },
        );
        assert!(!timeout.passed());
        assert!(timeout.to_string().contains("timed out"));
    }
}
