//! Everything one run shares between its phases.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::converter::{ConverterRegistry, DispatchSettings};
use crate::identifier::Identifier;
use crate::registry::{FileRegistry, TargetResolver};
use crate::routing::RouteTable;
use crate::runlog::RunLogHandle;

/// Explicitly constructed run dependencies, passed to the scheduler, the
/// merge pipeline and the consistency checker.
///
/// Cheap to clone: every field is either `Arc`-backed or small.
#[derive(Clone)]
pub struct RunContext {
    pub converters: ConverterRegistry,
    pub routes: Arc<RouteTable>,
    pub files: FileRegistry,
    pub identifier: Arc<dyn Identifier>,
    pub targets: Arc<TargetResolver>,
    pub run_log: RunLogHandle,
    pub dispatch: DispatchSettings,
    /// Root of the output tree; folder overrides are relative to it.
    pub output_root: PathBuf,
}

impl RunContext {
    /// Path of `path` relative to the output root, used for target
    /// resolution. Paths outside the root are returned unchanged.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.output_root).unwrap_or(path)
    }
}
