//! Run log: the append-only record of warnings and errors an operator reads
//! after a run, separate from diagnostic tracing output.

mod entry;
mod handle;
mod store;
mod writer;

pub use entry::*;
pub use handle::*;
pub use store::*;
pub use writer::*;
