//! Documentation report: what happened to every file of the run.

mod builder;
mod types;
mod writer;

pub use builder::DocumentationBuilder;
pub use types::{Documentation, FileEntry, FormatInfo, MergedEntry, RunSummary};
pub use writer::{read_documentation, write_documentation, ReportError};
