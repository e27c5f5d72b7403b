//! Documentation report structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consistency::FinalStatus;
use crate::formats::FormatCode;

/// Format, checksum and size of a file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub pronom: FormatCode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub size: u64,
}

/// One file of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: Uuid,
    /// Where the file started, relative to the output folder.
    pub original_path: String,
    /// Where the file ended up; absent when it no longer exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub original: FormatInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<FormatInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FormatCode>,
    pub converted_by: Vec<String>,
    pub is_converted: bool,
    pub status: FinalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub added_during_run: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_part_of_split: bool,
}

/// A merged document and the files consumed into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
    pub output: FileEntry,
    pub members: Vec<FileEntry>,
}

/// Counts for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub files_total: usize,
    pub converted: usize,
    pub unconverted: usize,
    pub failed: usize,
    pub not_supported: usize,
    pub output_not_set: usize,
    pub merged: usize,
    pub generations: u32,
    pub hops_succeeded: usize,
    pub hops_failed: usize,
    pub warnings: u64,
    pub errors: u64,
}

impl RunSummary {
    /// A clean run logged no errors. Warnings do not count.
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// The documentation written at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Documentation {
    pub generated_at: DateTime<Utc>,
    pub input_folder: String,
    pub output_folder: String,
    pub summary: RunSummary,
    /// Files that went through (or skipped) the hop pipeline, including
    /// merged documents.
    pub files: Vec<FileEntry>,
    pub merged: Vec<MergedEntry>,
    pub unsupported: Vec<FileEntry>,
    pub no_target: Vec<FileEntry>,
}
