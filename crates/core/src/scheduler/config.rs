//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;

/// Configuration for the conversion scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum dispatches running at once across all converters.
    pub max_concurrent: usize,

    /// Upper bound on generations. Every generation either shortens a route
    /// or removes a file, so only derived files that keep producing derived
    /// files can approach it.
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,
}

fn default_max_generations() -> u32 {
    64
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get() * 2,
            max_generations: default_max_generations(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_run_config(run: &RunConfig) -> Self {
        Self {
            max_concurrent: run.worker_threads(),
            ..Default::default()
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_max_generations(mut self, max_generations: u32) -> Self {
        self.max_generations = max_generations;
        self
    }
}
