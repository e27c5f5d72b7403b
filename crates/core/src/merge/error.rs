use std::path::PathBuf;
use thiserror::Error;

use crate::converter::ConverterError;
use crate::formats::FormatCode;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No registered converter can merge {format} files")]
    NoMerger { format: FormatCode },

    #[error("Merge converter failed after {attempts} attempt(s): {source}")]
    Converter {
        attempts: u32,
        #[source]
        source: ConverterError,
    },

    #[error("Failed to place merged document at {path}: {source}")]
    Placement {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MergeError {
    /// Whether the members should be reported as unsupported rather than
    /// failed.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, MergeError::NoMerger { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MergeError::NoMerger {
            format: FormatCode::from("fmt/40"),
        };
        assert_eq!(err.to_string(), "No registered converter can merge fmt/40 files");
        assert!(err.is_unsupported());

        let err = MergeError::Converter {
            attempts: 3,
            source: ConverterError::merge_failed("bad page"),
        };
        assert!(err.to_string().contains("3 attempt(s)"));
        assert!(!err.is_unsupported());
    }
}
