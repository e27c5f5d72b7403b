//! Merge pipeline for folders whose override diverts files into merged
//! documents instead of converting them one by one.

mod error;
mod pipeline;
mod plan;

pub use error::MergeError;
pub use pipeline::{MergePipeline, MergeSummary};
pub use plan::{plan_groups, MergeCandidate, MergeGroup};
