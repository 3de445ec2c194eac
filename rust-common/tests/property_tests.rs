//! Property-based tests for pact-common.
//!
//! These tests verify universal properties across all inputs using proptest.

use pact_common::{CommonError, HttpConfig};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* message, only timeout errors SHALL report a timeout, and
    /// every error SHALL keep the message in its display form.
    #[test]
    fn prop_only_timeouts_report_timeout(msg in "[a-zA-Z0-9 ]{1,50}") {
        let timeout = CommonError::timeout(msg.clone());
        prop_assert!(timeout.is_timeout());
        prop_assert!(timeout.to_string().contains(&msg));

        for err in [CommonError::unavailable(msg.clone()), CommonError::invalid_input(msg.clone())] {
            prop_assert!(!err.is_timeout(), "Error {:?} should not be a timeout", err);
            prop_assert!(err.to_string().contains(&msg));
        }
    }

    /// *For any* request timeout, the connect timeout SHALL never exceed it.
    #[test]
    fn prop_connect_timeout_never_exceeds_timeout(millis in 1u64..120_000) {
        let config = HttpConfig::default().with_timeout(Duration::from_millis(millis));
        prop_assert_eq!(config.timeout, Duration::from_millis(millis));
        prop_assert!(config.connect_timeout <= config.timeout);
    }
}
