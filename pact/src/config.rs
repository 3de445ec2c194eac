//! Engine configuration with validation.
//!
//! Values come from defaults, environment variables or `with_*` overrides.

use pact_common::HttpConfig;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Mock server host is not an IP address
    #[error("Invalid mock server host: {0}")]
    InvalidHost(String),

    /// Verification timeout is zero
    #[error("Invalid verification timeout: must be greater than 0")]
    InvalidTimeout,

    /// Contract directory is empty
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct PactConfig {
    /// Directory contract documents are written to
    pub pact_dir: PathBuf,
    /// Address the mock server binds to; the port is always ephemeral
    pub mock_host: IpAddr,
    /// Per-request timeout when replaying interactions against a provider
    pub verification_timeout: Duration,
    /// Whether a passing consumer test writes its contract document
    pub write_contracts: bool,
}

impl Default for PactConfig {
    fn default() -> Self {
        Self {
            pact_dir: PathBuf::from("./pacts"),
            mock_host: IpAddr::from([127, 0, 0, 1]),
            verification_timeout: Duration::from_secs(30),
            write_contracts: true,
        }
    }
}

impl PactConfig {
    /// Loads configuration from environment variables with validation.
    ///
    /// Recognised variables: `PACT_DIR`, `PACT_MOCK_HOST`,
    /// `PACT_VERIFY_TIMEOUT_SECS`, `PACT_WRITE_CONTRACTS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable does not parse or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable does not parse or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mock_host = match lookup("PACT_MOCK_HOST") {
            Some(host) => host
                .parse()
                .map_err(|_| ConfigError::InvalidHost(host.clone()))?,
            None => defaults.mock_host,
        };

        let config = Self {
            pact_dir: lookup("PACT_DIR").map_or(defaults.pact_dir, PathBuf::from),
            mock_host,
            verification_timeout: Duration::from_secs(parse_env(
                &lookup,
                "PACT_VERIFY_TIMEOUT_SECS",
                defaults.verification_timeout.as_secs(),
            )?),
            write_contracts: parse_env(&lookup, "PACT_WRITE_CONTRACTS", defaults.write_contracts)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero or the contract directory is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verification_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.pact_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("pact_dir".to_string()));
        }
        Ok(())
    }

    /// Set the contract output directory.
    #[must_use]
    pub fn with_pact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pact_dir = dir.into();
        self
    }

    /// Set the mock server bind address.
    #[must_use]
    pub const fn with_mock_host(mut self, host: IpAddr) -> Self {
        self.mock_host = host;
        self
    }

    /// Set the per-request verification timeout.
    #[must_use]
    pub const fn with_verification_timeout(mut self, timeout: Duration) -> Self {
        self.verification_timeout = timeout;
        self
    }

    /// Enable or disable contract writing after passing consumer tests.
    #[must_use]
    pub const fn with_write_contracts(mut self, write: bool) -> Self {
        self.write_contracts = write;
        self
    }

    /// HTTP client settings for the provider verifier.
    #[must_use]
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::default().with_timeout(self.verification_timeout)
    }
}

/// Parse a variable with a default value.
fn parse_env<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
