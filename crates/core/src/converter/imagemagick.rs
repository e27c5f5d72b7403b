//! Raster images through ImageMagick.

use async_trait::async_trait;
use std::path::PathBuf;

use super::capability::ConverterCapability;
use super::config::ImageMagickConfig;
use super::error::ConverterError;
use super::placement::list_outputs;
use super::process::{run_tool, tool_available};
use super::traits::{ensure_input, Converter, HopJob, HopOutput, MergeJob};
use crate::formats::pronom::*;

/// ImageMagick writes PDF 1.3 documents.
const IMAGE_PDF: &str = PDF_1_3;

/// Converts between raster formats and wraps images into PDF. Also merges
/// images into one multi-page PDF.
pub struct ImageMagickConverter {
    config: ImageMagickConfig,
    capability: ConverterCapability,
}

impl ImageMagickConverter {
    pub fn new(config: ImageMagickConfig) -> Self {
        let capability = ConverterCapability::new()
            .with_conversions(IMAGES, &[IMAGE_PDF])
            .with_conversions(IMAGES, &[PNG_1_2, TIFF, JPEG_1_02])
            .with_merge(IMAGES, IMAGE_PDF);
        Self { config, capability }
    }

    pub fn with_defaults() -> Self {
        Self::new(ImageMagickConfig::default())
    }
}

#[async_trait]
impl Converter for ImageMagickConverter {
    fn name(&self) -> &str {
        "imagemagick"
    }

    fn capability(&self) -> &ConverterCapability {
        &self.capability
    }

    async fn dependencies_satisfied(&self) -> bool {
        tool_available(&self.config.magick_path, "-version").await
    }

    async fn convert(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        ensure_input(&job.input)?;
        let extension = extension(job.to.as_str()).ok_or_else(|| {
            ConverterError::UnsupportedConversion {
                from: job.from.clone(),
                to: job.to.clone(),
            }
        })?;

        let output: PathBuf = job.output_path(extension);
        let args = [
            job.input.to_string_lossy().to_string(),
            output.to_string_lossy().to_string(),
        ];
        run_tool(self.name(), &self.config.magick_path, &args, None).await?;

        if output.exists() {
            return Ok(HopOutput::single(output));
        }

        // Multi-frame inputs (animated GIF, multi-page TIFF) become
        // `<stem>-0.<ext>`, `<stem>-1.<ext>`, ...
        let files = list_outputs(&job.work_dir, extension).await?;
        Ok(HopOutput {
            files,
            attachments: Vec::new(),
        })
    }

    async fn merge(&self, job: &MergeJob) -> Result<(), ConverterError> {
        if !self.capability.can_merge(&job.format) {
            return Err(ConverterError::merge_failed(format!(
                "cannot merge {} files",
                job.format
            )));
        }

        let mut args: Vec<String> = job
            .inputs
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        args.push(job.output.to_string_lossy().to_string());

        run_tool(self.name(), &self.config.magick_path, &args, None)
            .await
            .map(|_| ())
            .map_err(|e| ConverterError::merge_failed(e.to_string()))
    }
}
