//! Error types for the identifier module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while identifying files.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// Identification tool binary not found.
    #[error("Identification tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// File to identify does not exist.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The tool ran but reported failure.
    #[error("Identification failed: {reason}")]
    ToolFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Failed to parse tool output.
    #[error("Failed to parse identification output: {reason}")]
    ParseError { reason: String },

    /// Identification timed out.
    #[error("Identification timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IdentifyError {
    /// Creates a tool failure error with optional stderr output.
    pub fn tool_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ToolFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }
}
