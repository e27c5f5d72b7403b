//! Conversion scheduler: the generation loop over the working set.
//!
//! A generation dispatches the next hop of every in-flight file in parallel
//! (bounded by a worker pool), waits for all of them, then updates the
//! working set. The loop ends when the working set drains.

mod config;
mod progress;
mod runner;
mod types;
mod working_set;

pub use config::SchedulerConfig;
pub use progress::{
    JsonProgress, NoProgress, ProgressEvent, ProgressMode, ProgressReporter, ProgressTracker,
    StderrProgress,
};
pub use runner::ConversionScheduler;
pub use types::{HopState, ScheduleSummary, SchedulerError};
pub use working_set::{WorkItem, WorkingSet};
