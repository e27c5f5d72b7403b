//! Trait definition for format identification.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::error::IdentifyError;
use super::types::FileIdentity;

/// Classifies files by format signature.
#[async_trait]
pub trait Identifier: Send + Sync {
    /// Returns the name of this identifier implementation.
    fn name(&self) -> &str;

    /// Identifies a single file.
    async fn identify(&self, path: &Path) -> Result<FileIdentity, IdentifyError>;

    /// Identifies a group of files in one invocation.
    ///
    /// Returns one identity per input path, in input order. Files that fail
    /// individually come back unidentified rather than failing the batch.
    async fn identify_batch(&self, paths: &[PathBuf]) -> Result<Vec<FileIdentity>, IdentifyError> {
        let mut identities = Vec::with_capacity(paths.len());
        for path in paths {
            let identity = match self.identify(path).await {
                Ok(identity) => identity,
                Err(e) => FileIdentity::unidentified(path, e.to_string()),
            };
            identities.push(identity);
        }
        Ok(identities)
    }

    /// Validates that the identifier is available on this host.
    async fn validate(&self) -> Result<(), IdentifyError>;
}
