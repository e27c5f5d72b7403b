use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::converter::ConvertersConfig;
use crate::formats::FormatCode;
use crate::identifier::{ChecksumAlgorithm, IdentifierConfig};
use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub identifier: IdentifierConfig,
    #[serde(default)]
    pub converters: ConvertersConfig,
    /// Global per-format conversion settings.
    #[serde(default)]
    pub formats: Vec<FormatSetting>,
    /// Folder-scoped overrides, taking precedence over `formats`.
    #[serde(default)]
    pub folders: Vec<FolderOverride>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Global run settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Folder holding the files to convert. It is never modified.
    #[serde(default = "default_input_folder")]
    pub input_folder: PathBuf,
    /// Folder the input tree is copied into and converted in place.
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,
    /// Maximum concurrent conversions (0 = twice the logical CPU count).
    #[serde(default)]
    pub max_threads: usize,
    /// Wall-clock timeout for one conversion attempt.
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
    /// Maximum combined size of one merge output group.
    #[serde(default = "default_max_merge_size_mb")]
    pub max_merge_size_mb: u64,
    /// Checksum recorded for original and converted files.
    #[serde(default)]
    pub checksum: ChecksumAlgorithm,
    /// Attempts per hop before a file is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Longest route the resolver composes from direct capabilities.
    #[serde(default = "default_max_route_hops")]
    pub max_route_hops: usize,
    /// Scratch space for converters.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Where the documentation report is written.
    #[serde(default = "default_documentation_path")]
    pub documentation_path: PathBuf,
    /// Where the run log (JSON lines) is appended.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

fn default_input_folder() -> PathBuf {
    PathBuf::from("input")
}

fn default_output_folder() -> PathBuf {
    PathBuf::from("output")
}

fn default_timeout_minutes() -> u64 {
    20
}

fn default_max_merge_size_mb() -> u64 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_route_hops() -> usize {
    4
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("archivist")
}

fn default_documentation_path() -> PathBuf {
    PathBuf::from("documentation.json")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs").join("run.jsonl")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_folder: default_input_folder(),
            output_folder: default_output_folder(),
            max_threads: 0,
            timeout_minutes: default_timeout_minutes(),
            max_merge_size_mb: default_max_merge_size_mb(),
            checksum: ChecksumAlgorithm::default(),
            max_attempts: default_max_attempts(),
            max_route_hops: default_max_route_hops(),
            temp_dir: default_temp_dir(),
            documentation_path: default_documentation_path(),
            log_path: default_log_path(),
        }
    }
}

impl RunConfig {
    /// Effective worker count.
    pub fn worker_threads(&self) -> usize {
        if self.max_threads == 0 {
            num_cpus::get() * 2
        } else {
            self.max_threads
        }
    }

    /// Timeout applied to every conversion attempt.
    pub fn hop_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }

    pub fn max_merge_size_bytes(&self) -> u64 {
        self.max_merge_size_mb * 1024 * 1024
    }
}

/// Conversion setting for a group of source formats.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormatSetting {
    /// Human readable class name ("Word documents", "Images").
    #[serde(default)]
    pub name: String,
    /// Source formats this setting applies to.
    pub pronoms: Vec<FormatCode>,
    /// Target format. `None` leaves matching files without a target.
    #[serde(default)]
    pub default_target: Option<FormatCode>,
    /// Keep matching files in their current format.
    #[serde(default)]
    pub do_not_convert: bool,
}

/// Folder-scoped override of the global format settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FolderOverride {
    /// Folder relative to the output root. Applies to its subfolders too.
    pub path: PathBuf,
    /// Source formats the override applies to. Empty means every format.
    #[serde(default)]
    pub pronoms: Vec<FormatCode>,
    /// Target format for matching files.
    #[serde(default)]
    pub output: Option<FormatCode>,
    /// Divert matching files to the merge pipeline.
    #[serde(default)]
    pub merge: bool,
}

impl FolderOverride {
    /// Whether this override covers the given source format.
    pub fn applies_to(&self, format: &FormatCode) -> bool {
        self.pronoms.is_empty() || self.pronoms.contains(format)
    }
}
