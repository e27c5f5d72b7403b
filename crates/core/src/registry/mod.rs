//! File registry: the authoritative table of every file under management.
//!
//! Records are created once per discovered input (or derived output) and are
//! never removed; failed, unsupported and merged-away files stay flagged for
//! the documentation.

mod record;
mod store;
mod targets;

pub use record::{FileFlags, FileRecord};
pub use store::FileRegistry;
pub use targets::{TargetDecision, TargetResolver};
