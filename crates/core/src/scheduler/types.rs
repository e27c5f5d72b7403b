//! Types for the conversion scheduler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where one file stands within a generation.
///
/// `PendingDispatch → Dispatched → {CompletedHop, FailedHop}`, then after the
/// working-set update either back to `PendingDispatch` (route not exhausted),
/// `Done` or `Failed`. A file still `PendingDispatch` after dispatch was not
/// touched this generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopState {
    PendingDispatch,
    Dispatched,
    CompletedHop,
    FailedHop,
    Done,
    Failed,
}

impl HopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HopState::Done | HopState::Failed)
    }
}

/// Errors that can occur while scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Nothing could ever be dispatched.
    #[error("no converters registered")]
    NoConverters,

    /// A zero-sized worker pool would never run anything.
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

/// Outcome of one scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub generations: u32,
    pub hops_succeeded: usize,
    pub hops_failed: usize,
    /// Files whose route was exhausted.
    pub files_completed: usize,
    pub files_failed: usize,
    /// Files removed because no converter handled their next hop.
    pub files_unsupported: usize,
    /// Split pages and attachments registered mid-run.
    pub files_derived: usize,
    /// Files still queued when the generation limit stopped the loop.
    pub files_abandoned: usize,
}

impl ScheduleSummary {
    pub fn has_failures(&self) -> bool {
        self.hops_failed > 0 || self.files_abandoned > 0
    }
}
