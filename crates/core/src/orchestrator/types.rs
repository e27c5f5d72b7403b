//! Types for the conversion run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::consistency::ConsistencySummary;
use crate::merge::MergeSummary;
use crate::report::RunSummary;
use crate::scheduler::ScheduleSummary;

/// Errors that abort a run. Everything that goes wrong with a single file is
/// recorded on its record and in the run log instead.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration rejected by validation.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// No converter passed its dependency and platform checks.
    #[error("no converters available")]
    NoConverters,

    /// The identification tool is not usable.
    #[error("identifier unavailable: {0}")]
    Identifier(#[from] crate::identifier::IdentifyError),

    /// The input folder holds no files.
    #[error("no input files in {0}")]
    NoInput(PathBuf),

    /// Not a single input file could be identified.
    #[error("no identifiable input files in {0}")]
    NoIdentifiableInput(PathBuf),

    /// Workspace preparation error.
    #[error("workspace error: {0}")]
    Workspace(#[from] crate::discovery::DiscoveryError),

    /// Scheduler construction error.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    /// Run log could not be opened.
    #[error("run log error: {0}")]
    RunLog(#[from] crate::runlog::RunLogError),

    /// Documentation could not be written.
    #[error("documentation error: {0}")]
    Report(#[from] crate::report::ReportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Preparing,
    Identifying,
    ResolvingTargets,
    Merging,
    Routing,
    Scheduling,
    Checking,
    Documenting,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Preparing => "preparing",
            RunPhase::Identifying => "identifying",
            RunPhase::ResolvingTargets => "resolving_targets",
            RunPhase::Merging => "merging",
            RunPhase::Routing => "routing",
            RunPhase::Scheduling => "scheduling",
            RunPhase::Checking => "checking",
            RunPhase::Documenting => "documenting",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finished run reports back to its caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub schedule: ScheduleSummary,
    pub merge: MergeSummary,
    pub consistency: ConsistencySummary,
    pub documentation_path: PathBuf,
    pub log_path: PathBuf,
}

impl RunOutcome {
    /// No errors were written to the run log.
    pub fn is_clean(&self) -> bool {
        self.summary.is_clean()
    }
}
