//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::scheduler::ProgressMode;

/// Configuration for one conversion run's orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How scheduler progress is reported on stderr.
    #[serde(default)]
    pub progress: ProgressMode,

    /// Upper bound on scheduler generations. Files still queued when it is
    /// reached are marked failed.
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,

    /// Capacity of the run log channel.
    #[serde(default = "default_run_log_buffer")]
    pub run_log_buffer: usize,

    /// Remove the converters' scratch directory when the run ends.
    #[serde(default = "default_clean_temp_dir")]
    pub clean_temp_dir: bool,
}

fn default_max_generations() -> u32 {
    64
}

fn default_run_log_buffer() -> usize {
    1024
}

fn default_clean_temp_dir() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            progress: ProgressMode::default(),
            max_generations: default_max_generations(),
            run_log_buffer: default_run_log_buffer(),
            clean_temp_dir: default_clean_temp_dir(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_progress(mut self, progress: ProgressMode) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_max_generations(mut self, max_generations: u32) -> Self {
        self.max_generations = max_generations;
        self
    }
}
