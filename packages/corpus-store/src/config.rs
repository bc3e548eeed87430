//! Build configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};
use crate::extract::TextNormalization;

/// Default number of documents between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Settings for one index build.
///
/// Stored as pretty JSON so a corpus can be rebuilt with the same fields:
///
/// ```json
/// { "keys": ["title", "body"], "verbose": false, "progress_interval": 10000, "normalization": "ascii" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Fields concatenated into each document, in order.
    pub keys: Vec<String>,
    /// Report progress at info level instead of debug.
    #[serde(default)]
    pub verbose: bool,
    /// Documents between progress reports; 0 disables periodic reports.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default)]
    pub normalization: TextNormalization,
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

impl BuildConfig {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            verbose: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            normalization: TextNormalization::default(),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn normalization(mut self, normalization: TextNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(CorpusError::Config("at least one key is required".into()));
        }
        if let Some(pos) = self.keys.iter().position(|k| k.is_empty()) {
            return Err(CorpusError::Config(format!("key #{} is empty", pos)));
        }
        Ok(())
    }

    /// Read config from a JSON file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| CorpusError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Write config to a JSON file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CorpusError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
