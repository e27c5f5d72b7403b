//! Identification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::formats::FormatCode;

/// Everything the identifier reports about one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub format: FormatCode,
    pub format_name: String,
    pub mime: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl FileIdentity {
    /// An identity for a file that could not be classified.
    pub fn unidentified(path: &Path, error: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    pub fn is_identified(&self) -> bool {
        !self.format.is_unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unidentified() {
        let identity = FileIdentity::unidentified(Path::new("/a/b.bin"), "no match");
        assert!(!identity.is_identified());
        assert_eq!(identity.errors, vec!["no match".to_string()]);
        assert_eq!(identity.path, PathBuf::from("/a/b.bin"));
    }
}
