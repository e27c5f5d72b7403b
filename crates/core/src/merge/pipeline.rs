//! Merge pipeline: concatenates merge-diverted files into documents.

use std::path::Path;
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::MergeError;
use super::plan::{plan_groups, MergeCandidate, MergeGroup};
use crate::context::RunContext;
use crate::converter::{
    move_file, retry, unique_destination, verify_outputs, ConverterError, MergeJob,
    RegisteredConverter,
};
use crate::formats::{pronom, FormatCode};
use crate::identifier::FileIdentity;
use crate::metrics::MERGES_TOTAL;
use crate::registry::FileRecord;
use crate::runlog::LogEntry;

/// Outcome of the merge phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub groups: usize,
    /// Records of the merged documents, in group order.
    pub outputs: Vec<Uuid>,
    pub members_merged: usize,
    pub groups_failed: usize,
}

/// Groups every `should_merge` record and hands each group to the first
/// converter that can merge its format.
pub struct MergePipeline {
    context: RunContext,
    max_bytes: u64,
}

impl MergePipeline {
    pub fn new(context: RunContext, max_bytes: u64) -> Self {
        Self { context, max_bytes }
    }

    /// Live merge-diverted records with their destination folder.
    pub async fn candidates(&self) -> Vec<MergeCandidate> {
        let mut candidates = Vec::new();
        for record in self.context.files.records().await {
            if !record.is_live() || !record.flags.should_merge {
                continue;
            }
            let relative = self.context.relative(&record.path);
            let decision = self
                .context
                .targets
                .resolve(relative, &record.current_format);

            let folder = match decision.folder {
                Some(folder) => self.context.output_root.join(folder),
                None => record
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.context.output_root.clone()),
            };
            let size = fs::metadata(&record.path)
                .await
                .map(|m| m.len())
                .unwrap_or(record.original_size);

            candidates.push(MergeCandidate {
                id: record.id,
                path: record.path.clone(),
                format: record.current_format.clone(),
                size,
                folder,
                target: decision.target,
            });
        }
        candidates
    }

    pub async fn run(&self) -> MergeSummary {
        let groups = plan_groups(self.candidates().await, self.max_bytes);
        let mut summary = MergeSummary {
            groups: groups.len(),
            ..Default::default()
        };
        if groups.is_empty() {
            return summary;
        }

        info!(groups = groups.len(), "Merging files");
        for (index, group) in groups.iter().enumerate() {
            match self.merge_group(group, index + 1).await {
                Ok(id) => {
                    MERGES_TOTAL.with_label_values(&["success"]).inc();
                    summary.outputs.push(id);
                    summary.members_merged += group.members.len();
                }
                Err(e) => {
                    MERGES_TOTAL.with_label_values(&["failed"]).inc();
                    summary.groups_failed += 1;
                    self.reject(group, &e).await;
                }
            }
        }

        info!(
            outputs = summary.outputs.len(),
            merged = summary.members_merged,
            failed = summary.groups_failed,
            "Merge finished"
        );
        summary
    }

    async fn merge_group(&self, group: &MergeGroup, number: usize) -> Result<Uuid, MergeError> {
        let merger = self
            .context
            .converters
            .find_merger(&group.format)
            .ok_or_else(|| MergeError::NoMerger {
                format: group.format.clone(),
            })?;
        let produced = merger
            .converter()
            .capability()
            .merge_output()
            .cloned()
            .ok_or_else(|| MergeError::NoMerger {
                format: group.format.clone(),
            })?;
        let extension = pronom::extension(produced.as_str()).unwrap_or("pdf");

        let scratch = self
            .context
            .dispatch
            .temp_dir
            .join("merge")
            .join(Uuid::new_v4().to_string());
        let job = MergeJob {
            inputs: group.paths(),
            format: group.format.clone(),
            output: scratch.join(format!("merged.{}", extension)),
        };

        debug!(
            converter = merger.name(),
            folder = %group.folder.display(),
            members = group.members.len(),
            size = group.size(),
            "Merging group"
        );

        let result = retry(&self.context.dispatch.retry, |_| {
            self.attempt(&merger, &job, &scratch, &produced)
        })
        .await;

        let placed = match result {
            Ok(mut identity) => {
                let name = format!("merged-{:03}.{}", number, extension);
                let destination = unique_destination(&group.folder, &name, None);
                match move_file(&job.output, &destination).await {
                    Ok(()) => {
                        identity.path = destination.clone();
                        Ok((destination, identity))
                    }
                    Err(source) => Err(MergeError::Placement {
                        path: destination,
                        source,
                    }),
                }
            }
            Err(e) => Err(MergeError::Converter {
                attempts: e.attempts,
                source: e.error,
            }),
        };
        remove_dir_quietly(&scratch).await;
        let (destination, identity) = placed?;

        let mut record = FileRecord::from_identity(&destination, &identity);
        record.flags.added_during_run = true;
        record.flags.modified = true;
        // A merge override without an output keeps the merger's format.
        record.target_format = group.target.clone().or(Some(produced));
        record.converted_by.push(merger.name().to_string());
        let merged_id = self.context.files.insert(record).await;

        for member in &group.members {
            self.context
                .files
                .update(&member.id, |r| {
                    r.flags.is_merged = true;
                    r.flags.is_deleted = true;
                    r.merged_into = Some(merged_id);
                })
                .await;
            if let Err(e) = fs::remove_file(&member.path).await {
                warn!(path = %member.path.display(), error = %e, "Failed to remove merged member");
            }
        }

        info!(
            output = %destination.display(),
            members = group.members.len(),
            converter = merger.name(),
            "Merged document written"
        );
        Ok(merged_id)
    }

    async fn attempt(
        &self,
        merger: &RegisteredConverter,
        job: &MergeJob,
        scratch: &Path,
        produced: &FormatCode,
    ) -> Result<FileIdentity, ConverterError> {
        remove_dir_quietly(scratch).await;
        fs::create_dir_all(scratch)
            .await
            .map_err(|_| ConverterError::OutputDirectoryFailed {
                path: scratch.to_path_buf(),
            })?;

        let hop_timeout = self.context.dispatch.hop_timeout;
        timeout(hop_timeout, merger.converter().merge(job))
            .await
            .map_err(|_| ConverterError::Timeout {
                timeout_secs: hop_timeout.as_secs(),
            })??;

        let identities = verify_outputs(
            self.context.identifier.as_ref(),
            std::slice::from_ref(&job.output),
            produced,
        )
        .await?;
        identities
            .into_iter()
            .next()
            .ok_or_else(|| ConverterError::NoOutput {
                dir: scratch.to_path_buf(),
            })
    }

    /// Flags every member of a group that could not be merged. Their files
    /// stay where they are.
    async fn reject(&self, group: &MergeGroup, error: &MergeError) {
        let unsupported = error.is_unsupported();
        warn!(
            folder = %group.folder.display(),
            format = %group.format,
            members = group.members.len(),
            error = %error,
            "Merge group rejected"
        );

        for member in &group.members {
            let mime = self
                .context
                .files
                .update(&member.id, |r| {
                    if unsupported {
                        r.flags.not_supported = true;
                    } else {
                        r.flags.failed = true;
                    }
                    r.original_mime.clone()
                })
                .await
                .unwrap_or_default();

            let entry = if unsupported {
                LogEntry::warning(format!("Not merged: {}", error))
            } else {
                LogEntry::error(format!("Not merged: {}", error))
            };
            self.context
                .run_log
                .emit(
                    entry
                        .with_pronom(&member.format)
                        .with_mime(mime)
                        .with_file(&member.path),
                )
                .await;
        }
    }
}

async fn remove_dir_quietly(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir).await {
            debug!(dir = %dir.display(), error = %e, "Failed to clean merge scratch directory");
        }
    }
}
