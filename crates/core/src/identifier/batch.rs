//! Size-capped batching of identification requests.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

use super::config::IdentifierConfig;
use super::traits::Identifier;
use super::types::FileIdentity;

/// Splits files into batches holding at most `max_files` entries and at most
/// `max_bytes` combined size. A single file larger than `max_bytes` gets a
/// batch of its own.
pub fn plan_batches(
    files: &[(PathBuf, u64)],
    max_files: usize,
    max_bytes: u64,
) -> Vec<Vec<PathBuf>> {
    let max_files = max_files.max(1);
    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_bytes = 0u64;

    for (path, size) in files {
        let full = current.len() >= max_files;
        let too_big = !current.is_empty() && current_bytes.saturating_add(*size) > max_bytes;
        if full || too_big {
            batches.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current.push(path.clone());
        current_bytes = current_bytes.saturating_add(*size);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// Identifies every path using batched invocations.
///
/// A batch that fails as a whole falls back to identifying its members one at
/// a time, so one unreadable file never hides the rest of the batch.
pub async fn identify_all(
    identifier: &dyn Identifier,
    paths: &[PathBuf],
    config: &IdentifierConfig,
) -> HashMap<PathBuf, FileIdentity> {
    let mut sized = Vec::with_capacity(paths.len());
    for path in paths {
        let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        sized.push((path.clone(), size));
    }

    let mut result = HashMap::with_capacity(paths.len());
    for batch in plan_batches(&sized, config.batch_max_files, config.batch_max_bytes()) {
        match identifier.identify_batch(&batch).await {
            Ok(identities) => {
                for identity in identities {
                    result.insert(identity.path.clone(), identity);
                }
            }
            Err(e) => {
                warn!(
                    "Batch identification of {} files failed, retrying individually: {}",
                    batch.len(),
                    e
                );
                for path in &batch {
                    let identity = match identifier.identify(path).await {
                        Ok(identity) => identity,
                        Err(e) => FileIdentity::unidentified(path, e.to_string()),
                    };
                    result.insert(path.clone(), identity);
                }
            }
        }
    }

    result
}
