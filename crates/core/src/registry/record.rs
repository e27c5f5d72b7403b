//! One managed file.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::formats::FormatCode;
use crate::identifier::FileIdentity;

/// Status flags carried by every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFlags {
    /// A hop ran since the last consistency check.
    pub modified: bool,
    /// A hop exhausted its attempts.
    pub failed: bool,
    /// Created mid-run (attachment, split page, merge output).
    pub added_during_run: bool,
    /// Diverted to the merge pipeline.
    pub should_merge: bool,
    /// Consumed into a merged document.
    pub is_merged: bool,
    /// One of several files produced by splitting one input.
    pub is_part_of_split: bool,
    pub is_deleted: bool,
    /// No route reaches the target format.
    pub not_supported: bool,
    /// No target format configured.
    pub output_not_set: bool,
    /// Set by the consistency checker only.
    pub is_converted: bool,
}

/// A file under management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    /// Current location; repointed after every successful hop.
    pub path: PathBuf,
    pub original_path: PathBuf,

    pub original_format: FormatCode,
    pub original_format_name: String,
    pub original_mime: String,
    pub original_checksum: Option<String>,
    pub original_size: u64,

    pub current_format: FormatCode,
    pub target_format: Option<FormatCode>,

    pub new_format: Option<FormatCode>,
    pub new_format_name: Option<String>,
    pub new_mime: Option<String>,
    pub new_checksum: Option<String>,
    pub new_size: Option<u64>,

    /// Remaining hops to the target, consumed from the front.
    pub route: VecDeque<FormatCode>,
    /// Tool identifiers applied, in order.
    pub converted_by: Vec<String>,
    pub flags: FileFlags,
    /// Record this file was derived from.
    pub parent: Option<Uuid>,
    /// Merged document this file was consumed into.
    #[serde(default)]
    pub merged_into: Option<Uuid>,
}

impl FileRecord {
    /// Creates a record from a fresh identification.
    pub fn from_identity(path: &Path, identity: &FileIdentity) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.to_path_buf(),
            original_path: path.to_path_buf(),
            original_format: identity.format.clone(),
            original_format_name: identity.format_name.clone(),
            original_mime: identity.mime.clone(),
            original_checksum: identity.checksum.clone(),
            original_size: identity.size_bytes,
            current_format: identity.format.clone(),
            target_format: None,
            new_format: None,
            new_format_name: None,
            new_mime: None,
            new_checksum: None,
            new_size: None,
            route: VecDeque::new(),
            converted_by: Vec::new(),
            flags: FileFlags::default(),
            parent: None,
            merged_into: None,
        }
    }

    /// Creates a record derived from `parent` during the run.
    pub fn derived(path: &Path, identity: &FileIdentity, parent: Uuid) -> Self {
        let mut record = Self::from_identity(path, identity);
        record.parent = Some(parent);
        record.flags.added_during_run = true;
        record
    }

    /// A file with remaining hops that has not failed is still in flight.
    pub fn is_in_flight(&self) -> bool {
        !self.route.is_empty() && !self.flags.failed
    }

    /// Safe to finalize: route exhausted or failed.
    pub fn is_finalizable(&self) -> bool {
        self.route.is_empty() || self.flags.failed
    }

    /// Whether a target exists and differs from the current format.
    pub fn needs_conversion(&self) -> bool {
        matches!(&self.target_format, Some(target) if *target != self.current_format)
    }

    /// Whether the file still exists in the output tree.
    pub fn is_live(&self) -> bool {
        !self.flags.is_deleted && !self.flags.is_merged
    }

    /// Records a successful hop.
    pub fn complete_hop(&mut self, new_path: PathBuf, format: FormatCode, tool: &str) {
        self.path = new_path;
        self.current_format = format;
        self.route.pop_front();
        self.converted_by.push(tool.to_string());
        self.flags.modified = true;
    }

    /// File name for logs and reports.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}
