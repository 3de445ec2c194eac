//! Contract store: one JSON document per consumer/provider pair.

use crate::config::PactConfig;
use crate::contract::ContractDocument;
use crate::error::PactResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory-backed contract store.
#[derive(Debug, Clone)]
pub struct ContractStore {
    dir: PathBuf,
}

impl ContractStore {
    /// Store writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store writing into the configured contract directory.
    #[must_use]
    pub fn from_config(config: &PactConfig) -> Self {
        Self::new(config.pact_dir.clone())
    }

    /// Directory documents are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for a consumer/provider pair.
    #[must_use]
    pub fn path_for(&self, consumer: &str, provider: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", file_stem(consumer), file_stem(provider)))
    }

    /// Write a document, replacing any previous one for the same pair.
    ///
    /// Written to a temporary file next to the destination, then renamed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, document: &ContractDocument) -> PactResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&document.consumer.name, &document.provider.name);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, document.to_json_string()?)?;
        fs::rename(&tmp, &path)?;

        info!(
            consumer = %document.consumer.name,
            provider = %document.provider.name,
            interactions = document.interactions.len(),
            path = %path.display(),
            "Contract written"
        );
        Ok(path)
    }

    /// Load and validate a document.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`crate::PactError::MalformedDocument`] if it is invalid.
    pub fn load(path: impl AsRef<Path>) -> PactResult<ContractDocument> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading contract");
        let json = fs::read_to_string(path)?;
        ContractDocument::from_json_str(&json)
    }

    /// Load the document stored for a consumer/provider pair.
    ///
    /// # Errors
    ///
    /// See [`ContractStore::load`].
    pub fn load_for(&self, consumer: &str, provider: &str) -> PactResult<ContractDocument> {
        Self::load(self.path_for(consumer, provider))
    }
}

/// Participant name made safe for a file name.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
