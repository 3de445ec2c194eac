//! Per-test session state: registered interactions and the request ledger.

use crate::contract::Interaction;
use crate::error::{PactError, PactResult};
use crate::matching::{ActualRequest, HttpMismatch, match_request, match_route};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A request no registered interaction matched.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedRequest {
    /// Request method
    pub method: String,
    /// Request path
    pub path: String,
    /// Closest registered interaction, if any were registered
    pub nearest: Option<NearestMiss>,
    /// Why the request could not be matched at all, e.g. an unreadable body
    pub reason: Option<String>,
}

/// The registered interaction closest to an unmatched request.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestMiss {
    /// Interaction description
    pub description: String,
    /// Why it did not match
    pub diffs: Vec<HttpMismatch>,
}

impl fmt::Display for UnmatchedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(reason) = &self.reason {
            return write!(f, " ({reason})");
        }
        match &self.nearest {
            None => write!(f, " (no interactions registered)"),
            Some(nearest) => {
                write!(f, " (nearest: '{}')", nearest.description)?;
                for diff in &nearest.diffs {
                    write!(f, "\n      {diff}")?;
                }
                Ok(())
            }
        }
    }
}

/// An interaction invoked more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatedInteraction {
    /// Interaction description
    pub description: String,
    /// Number of matching requests received
    pub count: u32,
}

/// Verdict of one mock server session.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    /// Every interaction invoked exactly once and no unmatched requests
    pub ok: bool,
    /// Requests no interaction matched, in arrival order
    pub unmatched_requests: Vec<UnmatchedRequest>,
    /// Interactions never invoked
    pub unused_interactions: Vec<Interaction>,
    /// Interactions invoked more than once
    pub repeated_interactions: Vec<RepeatedInteraction>,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            return write!(f, "mock server verification passed");
        }
        write!(f, "mock server verification failed")?;
        if !self.unmatched_requests.is_empty() {
            write!(f, "\n  unmatched requests:")?;
            for request in &self.unmatched_requests {
                write!(f, "\n    {request}")?;
            }
        }
        if !self.unused_interactions.is_empty() {
            write!(f, "\n  interactions never invoked:")?;
            for interaction in &self.unused_interactions {
                write!(f, "\n    '{}'", interaction.description())?;
            }
        }
        if !self.repeated_interactions.is_empty() {
            write!(f, "\n  interactions invoked more than once:")?;
            for repeated in &self.repeated_interactions {
                write!(f, "\n    '{}' ({} times)", repeated.description, repeated.count)?;
            }
        }
        Ok(())
    }
}

/// How one incoming request was resolved.
#[derive(Debug, Clone)]
pub(crate) enum Dispatch {
    /// Exactly one interaction matched
    Matched(usize),
    /// Nothing matched
    Unmatched(UnmatchedRequest),
    /// Several interactions matched; descriptions listed
    Ambiguous(Vec<String>),
}

#[derive(Debug, Default)]
struct Ledger {
    invocations: Vec<u32>,
    unmatched: Vec<UnmatchedRequest>,
    ambiguous: Vec<String>,
}

/// Registered interactions and what happened to them.
///
/// The registry is immutable; the ledger is guarded by one lock.
#[derive(Debug)]
pub(crate) struct Session {
    interactions: Arc<[Interaction]>,
    ledger: Mutex<Ledger>,
}

impl Session {
    pub(crate) fn new(interactions: Vec<Interaction>) -> Self {
        let count = interactions.len();
        Self {
            interactions: interactions.into(),
            ledger: Mutex::new(Ledger {
                invocations: vec![0; count],
                ..Ledger::default()
            }),
        }
    }

    pub(crate) fn interaction(&self, index: usize) -> Option<&Interaction> {
        self.interactions.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Resolve a request and record the result.
    pub(crate) fn dispatch(&self, request: &ActualRequest) -> Dispatch {
        let results: Vec<Vec<HttpMismatch>> = self
            .interactions
            .iter()
            .map(|interaction| match_request(interaction.request(), request))
            .collect();
        let matched: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, diffs)| diffs.is_empty())
            .map(|(index, _)| index)
            .collect();

        match matched.as_slice() {
            [index] => {
                self.ledger.lock().invocations[*index] += 1;
                debug!(
                    interaction = %self.interactions[*index].description(),
                    method = %request.method,
                    path = %request.path,
                    "Request matched"
                );
                Dispatch::Matched(*index)
            }
            [] => {
                let unmatched = UnmatchedRequest {
                    method: request.method.clone(),
                    path: request.path.clone(),
                    nearest: self.nearest_miss(request, results),
                    reason: None,
                };
                warn!(method = %request.method, path = %request.path, "Unmatched request");
                self.ledger.lock().unmatched.push(unmatched.clone());
                Dispatch::Unmatched(unmatched)
            }
            many => {
                let descriptions: Vec<String> = many
                    .iter()
                    .map(|&index| self.interactions[index].description().to_string())
                    .collect();
                warn!(
                    method = %request.method,
                    path = %request.path,
                    candidates = ?descriptions,
                    "Request matched several interactions"
                );
                self.ledger.lock().ambiguous.push(format!(
                    "{} {} matched {}",
                    request.method,
                    request.path,
                    descriptions.join(", ")
                ));
                Dispatch::Ambiguous(descriptions)
            }
        }
    }

    /// Record a request that was rejected before it could be matched.
    pub(crate) fn reject(
        &self,
        method: &str,
        path: &str,
        reason: impl Into<String>,
    ) -> UnmatchedRequest {
        let unmatched = UnmatchedRequest {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            nearest: None,
            reason: Some(reason.into()),
        };
        warn!(method = %unmatched.method, path, reason = ?unmatched.reason, "Rejected request");
        self.ledger.lock().unmatched.push(unmatched.clone());
        unmatched
    }

    /// Route matches win, then the fewest diffs.
    fn nearest_miss(
        &self,
        request: &ActualRequest,
        results: Vec<Vec<HttpMismatch>>,
    ) -> Option<NearestMiss> {
        self.interactions
            .iter()
            .zip(results)
            .min_by_key(|(interaction, diffs)| {
                (!match_route(interaction.request(), request), diffs.len())
            })
            .map(|(interaction, diffs)| NearestMiss {
                description: interaction.description().to_string(),
                diffs,
            })
    }

    /// Summarise the session.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Configuration`] if any request matched several
    /// interactions.
    pub(crate) fn outcome(&self) -> PactResult<TestOutcome> {
        let ledger = self.ledger.lock();
        if !ledger.ambiguous.is_empty() {
            return Err(PactError::configuration(format!(
                "ambiguous interactions: {}",
                ledger.ambiguous.join("; ")
            )));
        }

        let mut unused_interactions = Vec::new();
        let mut repeated_interactions = Vec::new();
        for (interaction, &count) in self.interactions.iter().zip(&ledger.invocations) {
            match count {
                0 => unused_interactions.push(interaction.clone()),
                1 => {}
                _ => repeated_interactions.push(RepeatedInteraction {
                    description: interaction.description().to_string(),
                    count,
                }),
            }
        }

        let ok = ledger.unmatched.is_empty()
            && unused_interactions.is_empty()
            && repeated_interactions.is_empty();
        Ok(TestOutcome {
            ok,
            unmatched_requests: ledger.unmatched.clone(),
            unused_interactions,
            repeated_interactions,
        })
    }
}

/// Reject registrations where one interaction's example request satisfies
/// another interaction's request spec.
///
/// # Errors
///
/// Returns [`PactError::Configuration`] naming the first overlapping pair.
pub(crate) fn check_overlaps(interactions: &[Interaction]) -> PactResult<()> {
    for (i, first) in interactions.iter().enumerate() {
        let example = ActualRequest::from_example(first.request());
        for (j, second) in interactions.iter().enumerate() {
            if i != j && match_request(second.request(), &example).is_empty() {
                return Err(PactError::configuration(format!(
                    "interactions '{}' and '{}' accept the same request {} {}",
                    first.description(),
                    second.description(),
                    example.method,
                    example.path
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::InteractionBuilder;
    use crate::contract::Method;
    use crate::matchers::regex;

    fn get(description: &str, path: &str) -> Interaction {
        InteractionBuilder::new(description)
            .with_request(Method::Get, path)
            .build()
            .unwrap()
    }

    #[test]
    fn test_all_invoked_once_is_ok() {
        let session = Session::new(vec![get("list", "/projects"), get("one", "/projects/1")]);
        assert!(matches!(session.dispatch(&ActualRequest::new("GET", "/projects/1")), Dispatch::Matched(1)));
        assert!(matches!(session.dispatch(&ActualRequest::new("GET", "/projects")), Dispatch::Matched(0)));

        let outcome = session.outcome().unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.to_string(), "mock server verification passed");
    }

    #[test]
    fn test_unused_interaction_fails() {
        let session = Session::new(vec![get("list", "/projects"), get("missing", "/projects/999")]);
        session.dispatch(&ActualRequest::new("GET", "/projects"));

        let outcome = session.outcome().unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.unused_interactions.len(), 1);
        assert_eq!(outcome.unused_interactions[0].description(), "missing");
        assert!(outcome.to_string().contains("'missing'"));
    }

    #[test]
    fn test_unmatched_request_reports_nearest_miss() {
        let session = Session::new(vec![get("list", "/projects"), get("one", "/projects/1")]);
        let Dispatch::Unmatched(unmatched) = session.dispatch(&ActualRequest::new("POST", "/projects/1"))
        else {
            panic!("expected unmatched");
        };
        let nearest = unmatched.nearest.unwrap();
        assert_eq!(nearest.description, "one");
        assert_eq!(nearest.diffs.len(), 1);
        assert_eq!(nearest.diffs[0].to_string(), "method: expected GET, got \"POST\"");

        let outcome = session.outcome().unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.unmatched_requests.len(), 1);
    }

    #[test]
    fn test_nearest_miss_prefers_route_match() {
        let detailed = InteractionBuilder::new("search")
            .with_request(Method::Get, "/search")
            .query_param("q", "rust")
            .query_param("page", "1")
            .query_param("size", "10")
            .build()
            .unwrap();
        let session = Session::new(vec![get("other", "/other"), detailed]);
        let Dispatch::Unmatched(unmatched) = session.dispatch(&ActualRequest::new("GET", "/search"))
        else {
            panic!("expected unmatched");
        };
        assert_eq!(unmatched.nearest.unwrap().description, "search");
    }

    #[test]
    fn test_rejected_request_fails_session() {
        let session = Session::new(vec![get("list", "/projects")]);
        session.dispatch(&ActualRequest::new("GET", "/projects"));
        let rejected = session.reject("post", "/projects", "request body could not be read");
        assert_eq!(
            rejected.to_string(),
            "POST /projects (request body could not be read)"
        );

        let outcome = session.outcome().unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.unmatched_requests, vec![rejected]);
    }

    #[test]
    fn test_repeated_invocation_fails() {
        let session = Session::new(vec![get("list", "/projects")]);
        session.dispatch(&ActualRequest::new("GET", "/projects"));
        session.dispatch(&ActualRequest::new("GET", "/projects"));

        let outcome = session.outcome().unwrap();
        assert!(!outcome.ok);
        assert_eq!(
            outcome.repeated_interactions,
            vec![RepeatedInteraction { description: "list".to_string(), count: 2 }]
        );
    }

    #[test]
    fn test_ambiguous_request_is_configuration_error_at_end() {
        let templated = InteractionBuilder::new("any project")
            .with_request(Method::Get, regex(r"/projects/\d+", "/projects/2"))
            .build()
            .unwrap();
        let session = Session::new(vec![get("one", "/projects/1"), templated]);
        assert!(matches!(
            session.dispatch(&ActualRequest::new("GET", "/projects/1")),
            Dispatch::Ambiguous(_)
        ));
        assert!(matches!(session.outcome(), Err(PactError::Configuration(_))));
    }

    #[test]
    fn test_static_overlap_check() {
        assert!(check_overlaps(&[get("list", "/projects"), get("one", "/projects/1")]).is_ok());

        let templated = InteractionBuilder::new("any project")
            .with_request(Method::Get, regex(r"/projects/\d+", "/projects/2"))
            .build()
            .unwrap();
        let err = check_overlaps(&[get("one", "/projects/1"), templated]).unwrap_err();
        assert!(err.to_string().contains("'one' and 'any project'"));
    }
}
