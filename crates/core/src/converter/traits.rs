//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::capability::{ConverterCapability, FormatMap};
use super::error::ConverterError;
use crate::formats::FormatCode;

/// One attempt at one hop for one file.
#[derive(Debug, Clone)]
pub struct HopJob {
    pub file_id: Uuid,
    pub input: PathBuf,
    pub from: FormatCode,
    pub to: FormatCode,
    /// Empty scratch directory for this attempt. Outputs go here.
    pub work_dir: PathBuf,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl HopJob {
    /// Input file name without extension.
    pub fn stem(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_id.to_string())
    }

    /// `<work_dir>/<stem>.<extension>`
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.work_dir.join(format!("{}.{}", self.stem(), extension))
    }
}

/// Files produced by one successful attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HopOutput {
    /// Converted files in the hop format. Several files mean the input was split.
    pub files: Vec<PathBuf>,
    /// Embedded files pulled out of the input (e-mail attachments).
    pub attachments: Vec<PathBuf>,
}

impl HopOutput {
    pub fn single(path: PathBuf) -> Self {
        Self {
            files: vec![path],
            attachments: Vec::new(),
        }
    }

    pub fn is_split(&self) -> bool {
        self.files.len() > 1
    }
}

/// Concatenation of several same-format files into one document.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub inputs: Vec<PathBuf>,
    pub format: FormatCode,
    pub output: PathBuf,
}

/// A converter back-end.
///
/// `convert` performs exactly one attempt. Timeouts, retries, blocking
/// sections and output verification are applied by [`convert_file`].
///
/// [`convert_file`]: super::convert_file
#[async_trait]
pub trait Converter: Send + Sync {
    /// Tool identifier recorded in `converted_by`.
    fn name(&self) -> &str;

    fn capability(&self) -> &ConverterCapability;

    fn supported_conversions(&self) -> &FormatMap {
        self.capability().supported()
    }

    fn blocking_conversions(&self) -> &FormatMap {
        self.capability().blocking()
    }

    fn supports_conversion(&self, from: &FormatCode, to: &FormatCode) -> bool {
        self.capability().supports(from, to)
    }

    fn is_blocking(&self, from: &FormatCode, to: &FormatCode) -> bool {
        self.capability().is_blocking(from, to)
    }

    /// Whether the external tools this converter drives are available.
    async fn dependencies_satisfied(&self) -> bool;

    /// Runs a single conversion attempt.
    async fn convert(&self, job: &HopJob) -> Result<HopOutput, ConverterError>;

    /// Concatenates `job.inputs` into `job.output`.
    async fn merge(&self, job: &MergeJob) -> Result<(), ConverterError> {
        Err(ConverterError::UnsupportedConversion {
            from: job.format.clone(),
            to: self
                .capability()
                .merge_output()
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// Checks the input exists before a tool is started.
pub(crate) fn ensure_input(path: &Path) -> Result<(), ConverterError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ConverterError::InputNotFound {
            path: path.to_path_buf(),
        })
    }
}
