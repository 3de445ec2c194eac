//! Consumer-driven contract testing engine.
//!
//! A consumer declares the HTTP interactions it expects from a provider,
//! exercises them against an in-process [`MockServer`], and persists them as
//! a [`ContractDocument`]. The [`ProviderVerifier`] later replays that
//! document against the real provider.
//!
//! Flow: define, mock-verify, persist, replay-verify.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod contract;
pub mod error;
pub mod matchers;
pub mod matching;
pub mod mock_server;
pub mod pact;
pub mod store;
pub mod verification;
pub mod verifier;

pub use builder::{InteractionBuilder, declare_interaction};
pub use config::{ConfigError, PactConfig};
pub use contract::{
    ContractDocument, FORMAT_VERSION, Interaction, Method, Participant, RequestSpec, ResponseSpec,
};
pub use error::{PactError, PactResult};
pub use matchers::{MatcherNode, ObjectMatcher};
pub use matching::{HttpMismatch, MatchResult, PathedMismatch, match_value};
pub use mock_server::{
    MockServer, MockServerHandle, NearestMiss, RepeatedInteraction, ServerState, TestOutcome,
    UnmatchedRequest,
};
pub use pact::Pact;
pub use store::ContractStore;
pub use verification::{InteractionOutcome, InteractionResult, VerificationReport};
pub use verifier::{NoProviderStates, ProviderVerifier, StateHandler, verify_provider};
