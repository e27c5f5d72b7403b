//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use crate::formats::FormatCode;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// External tool binary not found.
    #[error("{tool} not found at path: {path}")]
    ToolNotFound { tool: String, path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The converter does not offer this conversion.
    #[error("Unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: FormatCode, to: FormatCode },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// Conversion process failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The converter reported success but produced nothing.
    #[error("Conversion produced no output in {dir}")]
    NoOutput { dir: PathBuf },

    /// Re-identification of an output did not match the intended format.
    #[error("Output {path} identified as {actual}, expected {expected}")]
    VerificationFailed {
        path: PathBuf,
        expected: FormatCode,
        actual: FormatCode,
    },

    /// Re-identification itself failed.
    #[error("Failed to identify output {path}: {reason}")]
    IdentificationFailed { path: PathBuf, reason: String },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The dispatch task panicked or was aborted.
    #[error("Conversion task aborted: {reason}")]
    Aborted { reason: String },

    /// Merge of several inputs failed.
    #[error("Merge failed: {reason}")]
    MergeFailed { reason: String },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a tool-not-found error.
    pub fn tool_not_found(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            path: path.into(),
        }
    }

    /// Creates a new merge failed error.
    pub fn merge_failed(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
        }
    }

    /// Whether another attempt of the same hop could succeed.
    ///
    /// Missing tools, missing inputs and unsupported pairs fail the same way
    /// every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::ToolNotFound { .. }
                | Self::InputNotFound { .. }
                | Self::UnsupportedConversion { .. }
        )
    }
}
