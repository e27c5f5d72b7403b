//! Building the documentation from the registry.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::types::{Documentation, FileEntry, FormatInfo, MergedEntry, RunSummary};
use crate::consistency::FinalStatus;
use crate::registry::FileRecord;

/// Sorts records into the report sections.
pub struct DocumentationBuilder {
    input_root: PathBuf,
    output_root: PathBuf,
    summary: RunSummary,
}

impl DocumentationBuilder {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            summary: RunSummary::default(),
        }
    }

    /// Run-level counters the registry does not hold (generations, hops,
    /// log counts). File counts are recomputed in [`build`].
    ///
    /// [`build`]: DocumentationBuilder::build
    pub fn with_summary(mut self, summary: RunSummary) -> Self {
        self.summary = summary;
        self
    }

    pub fn build(&self, records: &[FileRecord]) -> Documentation {
        let mut summary = self.summary.clone();
        summary.files_total = records.len();
        summary.converted = 0;
        summary.unconverted = 0;
        summary.failed = 0;
        summary.not_supported = 0;
        summary.output_not_set = 0;
        summary.merged = 0;

        let mut members: HashMap<Uuid, Vec<FileEntry>> = HashMap::new();
        let mut files = Vec::new();
        let mut unsupported = Vec::new();
        let mut no_target = Vec::new();

        for record in records {
            let entry = self.entry(record);
            match entry.status {
                FinalStatus::Merged => {
                    summary.merged += 1;
                    if let Some(output) = record.merged_into {
                        members.entry(output).or_default().push(entry);
                    }
                }
                FinalStatus::NotSupported => {
                    summary.not_supported += 1;
                    unsupported.push(entry);
                }
                FinalStatus::OutputNotSet => {
                    summary.output_not_set += 1;
                    no_target.push(entry);
                }
                status => {
                    match status {
                        FinalStatus::Converted => summary.converted += 1,
                        FinalStatus::Failed => summary.failed += 1,
                        _ => summary.unconverted += 1,
                    }
                    files.push(entry);
                }
            }
        }

        let mut merged: Vec<MergedEntry> = files
            .iter()
            .filter_map(|output| {
                members.remove(&output.id).map(|members| MergedEntry {
                    output: output.clone(),
                    members,
                })
            })
            .collect();
        merged.sort_by(|a, b| a.output.original_path.cmp(&b.output.original_path));

        Documentation {
            generated_at: Utc::now(),
            input_folder: self.input_root.display().to_string(),
            output_folder: self.output_root.display().to_string(),
            summary,
            files,
            merged,
            unsupported,
            no_target,
        }
    }

    fn entry(&self, record: &FileRecord) -> FileEntry {
        let new = record.new_format.as_ref().map(|format| FormatInfo {
            pronom: format.clone(),
            name: record.new_format_name.clone().unwrap_or_default(),
            mime: record.new_mime.clone().unwrap_or_default(),
            checksum: record.new_checksum.clone(),
            size: record.new_size.unwrap_or_default(),
        });

        FileEntry {
            id: record.id,
            original_path: self.relative(&record.original_path),
            new_path: record.is_live().then(|| self.relative(&record.path)),
            original: FormatInfo {
                pronom: record.original_format.clone(),
                name: record.original_format_name.clone(),
                mime: record.original_mime.clone(),
                checksum: record.original_checksum.clone(),
                size: record.original_size,
            },
            new,
            target: record.target_format.clone(),
            converted_by: record.converted_by.clone(),
            is_converted: record.flags.is_converted,
            status: FinalStatus::of(record),
            parent: record.parent,
            added_during_run: record.flags.added_during_run,
            is_part_of_split: record.flags.is_part_of_split,
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.output_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatCode;
    use crate::identifier::FileIdentity;

    fn record(path: &str, format: &str, target: Option<&str>) -> FileRecord {
        let identity = FileIdentity {
            format: FormatCode::from(format),
            size_bytes: 10,
            checksum: Some("abc".to_string()),
            ..Default::default()
        };
        let mut record = FileRecord::from_identity(Path::new(path), &identity);
        record.target_format = target.map(FormatCode::from);
        record
    }

    #[test]
    fn test_sections() {
        let mut converted = record("/out/a.doc", "fmt/40", Some("fmt/477"));
        converted.path = PathBuf::from("/out/a.pdf");
        converted.converted_by = vec!["libreoffice".into(), "ghostscript".into()];
        converted.new_format = Some("fmt/477".into());
        converted.new_size = Some(20);
        converted.flags.is_converted = true;

        let mut unsupported = record("/out/b.xyz", "fmt/999", Some("fmt/477"));
        unsupported.flags.not_supported = true;

        let mut unset = record("/out/c.bin", "fmt/998", None);
        unset.flags.output_not_set = true;

        let mut failed = record("/out/d.doc", "fmt/40", Some("fmt/477"));
        failed.flags.failed = true;

        let builder = DocumentationBuilder::new("/in", "/out").with_summary(RunSummary {
            generations: 2,
            errors: 1,
            ..Default::default()
        });
        let doc = builder.build(&[converted, unsupported, unset, failed]);

        assert_eq!(doc.summary.files_total, 4);
        assert_eq!(doc.summary.converted, 1);
        assert_eq!(doc.summary.failed, 1);
        assert_eq!(doc.summary.generations, 2);
        assert!(!doc.summary.is_clean());

        assert_eq!(doc.files.len(), 2);
        let entry = &doc.files[0];
        assert_eq!(entry.original_path, "a.doc");
        assert_eq!(entry.new_path.as_deref(), Some("a.pdf"));
        assert_eq!(entry.converted_by, vec!["libreoffice", "ghostscript"]);
        assert_eq!(entry.new.as_ref().unwrap().size, 20);
        assert!(entry.is_converted);

        assert_eq!(doc.unsupported.len(), 1);
        assert_eq!(doc.no_target.len(), 1);
        assert_eq!(doc.no_target[0].status, FinalStatus::OutputNotSet);
    }

    #[test]
    fn test_merged_section_links_members() {
        let mut output = record("/out/scans/merged-001.pdf", "fmt/17", Some("fmt/17"));
        output.flags.is_converted = true;
        let mut members = Vec::new();
        for name in ["a.png", "b.png"] {
            let mut member = record(&format!("/out/scans/{}", name), "fmt/13", Some("fmt/17"));
            member.flags.should_merge = true;
            member.flags.is_merged = true;
            member.flags.is_deleted = true;
            member.merged_into = Some(output.id);
            members.push(member);
        }

        let mut records = members;
        records.push(output.clone());
        let doc = DocumentationBuilder::new("/in", "/out").build(&records);

        assert_eq!(doc.summary.merged, 2);
        assert_eq!(doc.merged.len(), 1);
        assert_eq!(doc.merged[0].output.id, output.id);
        assert_eq!(doc.merged[0].members.len(), 2);
        assert!(doc.merged[0].members[0].new_path.is_none());
        assert_eq!(doc.files.len(), 1);
    }

    #[test]
    fn test_serializes_status_snake_case() {
        let mut unset = record("/out/c.bin", "fmt/998", None);
        unset.flags.output_not_set = true;
        let doc = DocumentationBuilder::new("/in", "/out").build(&[unset]);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["no_target"][0]["status"], "output_not_set");
        assert!(json["no_target"][0].get("target").is_none());
    }
}
