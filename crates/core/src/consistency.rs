//! Final reconciliation of the registry against the files on disk.
//!
//! Flags set while scheduling (`modified`, `failed`) are advisory. The
//! verdict the report relies on is `is_converted`, which is only ever set
//! here, from a fresh identification of every live file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::formats::FormatCode;
use crate::identifier::{identify_all, FileIdentity, Identifier, IdentifierConfig};
use crate::metrics::FILES_FINAL;
use crate::registry::{FileRecord, FileRegistry};
use crate::runlog::{LogEntry, RunLogHandle};

/// Final status of one record, in reporting precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Merged,
    OutputNotSet,
    NotSupported,
    Failed,
    Converted,
    /// Has a target but the re-identified format differs.
    Unconverted,
}

impl FinalStatus {
    pub fn of(record: &FileRecord) -> Self {
        if record.flags.is_merged {
            FinalStatus::Merged
        } else if record.flags.output_not_set {
            FinalStatus::OutputNotSet
        } else if record.flags.not_supported {
            FinalStatus::NotSupported
        } else if record.flags.is_converted {
            FinalStatus::Converted
        } else if record.flags.failed {
            FinalStatus::Failed
        } else {
            FinalStatus::Unconverted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Merged => "merged",
            FinalStatus::OutputNotSet => "output_not_set",
            FinalStatus::NotSupported => "not_supported",
            FinalStatus::Failed => "failed",
            FinalStatus::Converted => "converted",
            FinalStatus::Unconverted => "unconverted",
        }
    }
}

/// Counts by final status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencySummary {
    /// Live records re-identified.
    pub checked: usize,
    pub converted: usize,
    pub unconverted: usize,
    pub failed: usize,
    pub not_supported: usize,
    pub output_not_set: usize,
    pub merged: usize,
}

impl ConsistencySummary {
    fn count(&mut self, status: FinalStatus) {
        match status {
            FinalStatus::Merged => self.merged += 1,
            FinalStatus::OutputNotSet => self.output_not_set += 1,
            FinalStatus::NotSupported => self.not_supported += 1,
            FinalStatus::Failed => self.failed += 1,
            FinalStatus::Converted => self.converted += 1,
            FinalStatus::Unconverted => self.unconverted += 1,
        }
    }
}

/// Re-identifies every live file and decides `is_converted`.
pub struct ConsistencyChecker {
    identifier: Arc<dyn Identifier>,
    config: IdentifierConfig,
    run_log: Option<RunLogHandle>,
}

impl ConsistencyChecker {
    pub fn new(identifier: Arc<dyn Identifier>, config: IdentifierConfig) -> Self {
        Self {
            identifier,
            config,
            run_log: None,
        }
    }

    pub fn with_run_log(mut self, run_log: RunLogHandle) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Stores the new identification on every live record and sets
    /// `is_converted = (new_format == target)`. Merged-away and deleted
    /// records keep `is_converted = false`.
    pub async fn finalize(&self, files: &FileRegistry) -> ConsistencySummary {
        let records = files.records().await;
        let paths: Vec<PathBuf> = records
            .iter()
            .filter(|r| r.is_live())
            .map(|r| r.path.clone())
            .collect();

        let mut identities: HashMap<PathBuf, FileIdentity> =
            identify_all(self.identifier.as_ref(), &paths, &self.config).await;

        let mut summary = ConsistencySummary {
            checked: paths.len(),
            ..Default::default()
        };

        for record in records {
            if record.is_live() {
                let identity = identities
                    .remove(&record.path)
                    .unwrap_or_else(|| FileIdentity::unidentified(&record.path, "not identified"));
                let updated = files
                    .update(&record.id, |r| apply_identity(r, identity))
                    .await;
                if let Some(updated) = updated {
                    self.report_mismatch(&updated).await;
                    let status = FinalStatus::of(&updated);
                    summary.count(status);
                    FILES_FINAL.with_label_values(&[status.as_str()]).inc();
                }
            } else {
                files.update(&record.id, |r| r.flags.is_converted = false).await;
                let status = FinalStatus::of(&record);
                summary.count(status);
                FILES_FINAL.with_label_values(&[status.as_str()]).inc();
            }
        }

        info!(
            checked = summary.checked,
            converted = summary.converted,
            unconverted = summary.unconverted,
            failed = summary.failed,
            not_supported = summary.not_supported,
            output_not_set = summary.output_not_set,
            merged = summary.merged,
            "Consistency check finished"
        );
        summary
    }

    /// A file that should have reached its target but did not, without a
    /// flag already explaining why.
    async fn report_mismatch(&self, record: &FileRecord) {
        let Some(ref target) = record.target_format else {
            return;
        };
        if record.flags.is_converted || record.flags.failed || record.flags.not_supported {
            return;
        }

        let found = record.new_format.clone().unwrap_or_else(FormatCode::unknown);
        warn!(
            path = %record.path.display(),
            target = %target,
            found = %found,
            "File did not reach its target format"
        );
        if let Some(ref run_log) = self.run_log {
            let entry = LogEntry::warning(format!(
                "Identified as {} after conversion, expected {}",
                found, target
            ))
            .with_pronom(&found)
            .with_mime(record.new_mime.clone().unwrap_or_default())
            .with_file(&record.path);
            run_log.emit(entry).await;
        }
    }
}

/// Copies an identification into the record's `new_*` fields and returns
/// the updated record.
fn apply_identity(record: &mut FileRecord, identity: FileIdentity) -> FileRecord {
    record.flags.is_converted = match record.target_format {
        Some(ref target) => identity.is_identified() && identity.format == *target,
        None => false,
    };
    record.flags.modified = false;
    record.new_format = Some(identity.format);
    record.new_format_name = Some(identity.format_name);
    record.new_mime = Some(identity.mime);
    record.new_checksum = identity.checksum;
    record.new_size = Some(identity.size_bytes);
    record.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::{create_run_log, MemoryStore};
    use crate::testing::MockIdentifier;
    use std::path::Path;
    use tempfile::TempDir;

    async fn add(
        files: &FileRegistry,
        identifier: &MockIdentifier,
        path: &Path,
        format: &str,
        target: Option<&str>,
    ) -> uuid::Uuid {
        MockIdentifier::write_tagged(path, format).await.unwrap();
        let identity = identifier.identify(path).await.unwrap();
        let mut record = FileRecord::from_identity(path, &identity);
        record.target_format = target.map(FormatCode::from);
        files.insert(record).await
    }

    fn checker(identifier: Arc<MockIdentifier>) -> (ConsistencyChecker, RunLogHandle) {
        let (run_log, writer) = create_run_log(Arc::new(MemoryStore::new()), 64);
        tokio::spawn(writer.run());
        let checker = ConsistencyChecker::new(identifier, IdentifierConfig::default())
            .with_run_log(run_log.clone());
        (checker, run_log)
    }

    #[tokio::test]
    async fn test_noop_file_is_converted_without_dispatch() {
        let dir = TempDir::new().unwrap();
        let identifier = Arc::new(MockIdentifier::new());
        let files = FileRegistry::new();
        let id = add(&files, &identifier, &dir.path().join("a.pdf"), "fmt/477", Some("fmt/477")).await;

        let (checker, run_log) = checker(identifier);
        let summary = checker.finalize(&files).await;

        assert_eq!(summary.converted, 1);
        let record = files.get(&id).await.unwrap();
        assert!(record.flags.is_converted);
        assert!(record.converted_by.is_empty());
        assert_eq!(record.new_format.as_ref().unwrap().as_str(), "fmt/477");
        assert!(record.new_checksum.is_some());
        assert!(!run_log.has_problems());
    }

    #[tokio::test]
    async fn test_verdict_comes_from_reidentification() {
        let dir = TempDir::new().unwrap();
        let identifier = Arc::new(MockIdentifier::new());
        let files = FileRegistry::new();
        let path = dir.path().join("a.doc");
        let id = add(&files, &identifier, &path, "fmt/40", Some("fmt/477")).await;

        // Flags claim a finished conversion, the file on disk disagrees.
        files
            .update(&id, |r| {
                r.current_format = FormatCode::from("fmt/477");
                r.flags.modified = true;
            })
            .await;

        let (checker, run_log) = checker(identifier);
        let summary = checker.finalize(&files).await;

        assert_eq!(summary.unconverted, 1);
        let record = files.get(&id).await.unwrap();
        assert!(!record.flags.is_converted);
        assert!(!record.flags.modified);
        assert_eq!(record.new_format.as_ref().unwrap().as_str(), "fmt/40");
        assert_eq!(run_log.warning_count(), 1);
    }

    #[tokio::test]
    async fn test_statuses() {
        let dir = TempDir::new().unwrap();
        let identifier = Arc::new(MockIdentifier::new());
        let files = FileRegistry::new();

        add(&files, &identifier, &dir.path().join("none.bin"), "fmt/999", None).await;
        let unset = files.find_by_path(&dir.path().join("none.bin")).await.unwrap().id;
        files.update(&unset, |r| r.flags.output_not_set = true).await;

        let failed = add(&files, &identifier, &dir.path().join("f.doc"), "fmt/40", Some("fmt/477")).await;
        files.update(&failed, |r| r.flags.failed = true).await;

        let merged = add(&files, &identifier, &dir.path().join("m.png"), "fmt/13", Some("fmt/477")).await;
        files
            .update(&merged, |r| {
                r.flags.is_merged = true;
                r.flags.is_deleted = true;
            })
            .await;

        let (checker, run_log) = checker(identifier);
        let summary = checker.finalize(&files).await;

        assert_eq!(summary.checked, 2);
        assert_eq!(summary.output_not_set, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.merged, 1);
        assert!(files.get(&merged).await.unwrap().new_format.is_none());
        // Already-explained outcomes are not logged again.
        assert_eq!(run_log.warning_count(), 0);
    }

    #[test]
    fn test_status_precedence() {
        let identity = FileIdentity {
            format: FormatCode::from("fmt/40"),
            ..Default::default()
        };
        let mut record = FileRecord::from_identity(Path::new("/out/a.doc"), &identity);
        assert_eq!(FinalStatus::of(&record), FinalStatus::Unconverted);
        record.flags.failed = true;
        assert_eq!(FinalStatus::of(&record), FinalStatus::Failed);
        record.flags.not_supported = true;
        assert_eq!(FinalStatus::of(&record), FinalStatus::NotSupported);
        record.flags.is_merged = true;
        assert_eq!(FinalStatus::of(&record).as_str(), "merged");
    }
}
