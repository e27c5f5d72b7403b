//! Configuration for the identifier.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the Siegfried-based identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierConfig {
    /// Path to the `sf` binary.
    #[serde(default = "default_sf_path")]
    pub sf_path: PathBuf,

    /// Maximum number of files per batched invocation.
    #[serde(default = "default_batch_max_files")]
    pub batch_max_files: usize,

    /// Maximum combined size in megabytes per batched invocation.
    #[serde(default = "default_batch_max_mb")]
    pub batch_max_mb: u64,

    /// Timeout for one invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_sf_path() -> PathBuf {
    PathBuf::from("sf")
}

fn default_batch_max_files() -> usize {
    256
}

fn default_batch_max_mb() -> u64 {
    1024
}

fn default_timeout() -> u64 {
    600
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            sf_path: default_sf_path(),
            batch_max_files: default_batch_max_files(),
            batch_max_mb: default_batch_max_mb(),
            timeout_secs: default_timeout(),
        }
    }
}

impl IdentifierConfig {
    pub fn batch_max_bytes(&self) -> u64 {
        self.batch_max_mb * 1024 * 1024
    }
}
