//! Conversion run orchestration.
//!
//! A run moves through fixed phases, each finishing before the next starts:
//! - **Preparing**: the input tree is copied into the output folder
//! - **Identifying**: every copy is identified; unknown formats are unsupported
//! - **Resolving targets**: folder overrides, then global format settings
//! - **Merging**: merge-diverted files are combined per folder
//! - **Routing**: one route per `(current, target)` key
//! - **Scheduling**: the generation loop (see `scheduler`)
//! - **Checking**: re-identification decides `is_converted`
//! - **Documenting**: the JSON report is written

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::ConversionRun;
pub use types::{RunError, RunOutcome, RunPhase};
