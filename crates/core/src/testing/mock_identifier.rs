//! Mock identifier for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::formats::FormatCode;
use crate::identifier::{
    file_checksum, ChecksumAlgorithm, FileIdentity, Identifier, IdentifyError,
};

const TAG_PREFIX: &str = "FORMAT:";

/// Identifier that reads the format from the file content.
///
/// Files written with [`MockIdentifier::write_tagged`] start with
/// `FORMAT:<code>`; anything else identifies as unknown.
#[derive(Debug, Default)]
pub struct MockIdentifier {
    calls: AtomicUsize,
    failing: RwLock<HashSet<PathBuf>>,
}

impl MockIdentifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a file identifying as `format`, creating parent directories.
    pub async fn write_tagged(path: &Path, format: &str) -> std::io::Result<()> {
        Self::write_tagged_sized(path, format, 0).await
    }

    /// Writes a tagged file padded to at least `size` bytes.
    pub async fn write_tagged_sized(path: &Path, format: &str, size: usize) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut content = format!("{}{}\n", TAG_PREFIX, format).into_bytes();
        if content.len() < size {
            content.resize(size, b'.');
        }
        tokio::fs::write(path, content).await
    }

    /// Format tag at the start of `content`.
    pub fn parse_tag(content: &str) -> Option<FormatCode> {
        let line = content.lines().next()?;
        let code = line.strip_prefix(TAG_PREFIX)?.trim();
        if code.is_empty() {
            None
        } else {
            Some(FormatCode::from(code))
        }
    }

    /// Make identification of `path` fail.
    pub async fn fail_for(&self, path: impl AsRef<Path>) {
        self.failing
            .write()
            .await
            .insert(path.as_ref().to_path_buf());
    }

    /// Number of single-file identifications performed.
    pub fn identify_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Identifier for MockIdentifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn identify(&self, path: &Path) -> Result<FileIdentity, IdentifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.read().await.contains(path) {
            return Err(IdentifyError::tool_failed("injected failure", None));
        }

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IdentifyError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IdentifyError::Io(e)
            }
        })?;

        let bytes = tokio::fs::read(path).await?;
        let format = Self::parse_tag(&String::from_utf8_lossy(&bytes)).unwrap_or_default();
        let format_name = if format.is_unknown() {
            String::new()
        } else {
            format!("Mock format {}", format)
        };

        Ok(FileIdentity {
            path: path.to_path_buf(),
            format_name,
            mime: "application/octet-stream".to_string(),
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            checksum: file_checksum(path, ChecksumAlgorithm::Md5).await.ok(),
            errors: Vec::new(),
            warnings: Vec::new(),
            format,
        })
    }

    async fn validate(&self) -> Result<(), IdentifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_identifies_tagged_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/a.doc");
        MockIdentifier::write_tagged_sized(&path, "fmt/40", 1000)
            .await
            .unwrap();

        let identifier = MockIdentifier::new();
        let identity = identifier.identify(&path).await.unwrap();
        assert_eq!(identity.format.as_str(), "fmt/40");
        assert_eq!(identity.size_bytes, 1000);
        assert!(identity.checksum.is_some());
        assert_eq!(identifier.identify_count(), 1);
    }

    #[tokio::test]
    async fn test_untagged_is_unknown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        tokio::fs::write(&path, b"\x00\x01binary").await.unwrap();

        let identity = MockIdentifier::new().identify(&path).await.unwrap();
        assert!(!identity.is_identified());
    }

    #[tokio::test]
    async fn test_missing_and_injected_failure() {
        let dir = TempDir::new().unwrap();
        let identifier = MockIdentifier::new();
        assert!(matches!(
            identifier.identify(&dir.path().join("missing")).await,
            Err(IdentifyError::FileNotFound { .. })
        ));

        let path = dir.path().join("a.pdf");
        MockIdentifier::write_tagged(&path, "fmt/276").await.unwrap();
        identifier.fail_for(&path).await;
        assert!(identifier.identify(&path).await.is_err());
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(
            MockIdentifier::parse_tag("FORMAT:x-fmt/430\nrest"),
            Some(FormatCode::from("x-fmt/430"))
        );
        assert_eq!(MockIdentifier::parse_tag("FORMAT:\n"), None);
        assert_eq!(MockIdentifier::parse_tag("%PDF-1.7"), None);
    }
}
