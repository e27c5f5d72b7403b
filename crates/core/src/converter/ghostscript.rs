//! PDF and PostScript through Ghostscript.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::capability::ConverterCapability;
use super::config::GhostscriptConfig;
use super::error::ConverterError;
use super::placement::list_outputs;
use super::process::{run_tool, tool_available};
use super::resources::ResourcePool;
use super::traits::{ensure_input, Converter, HopJob, HopOutput, MergeJob};
use crate::config::RunConfig;
use crate::formats::pronom::*;

const POSTSCRIPT: &[&str] = &[POSTSCRIPT_2, POSTSCRIPT_3, EPS_3];
const PDFA_TARGETS: &[&str] = &[PDF_A_1B, PDF_A_2B, PDF_A_3B];
const PAGE_IMAGES: &[&str] = &[PNG_1_2, TIFF];

/// One private copy of the ICC profile with its PDF/A definition file.
///
/// Ghostscript reads the definition while writing; concurrent runs each
/// get their own slot.
#[derive(Debug, Clone)]
pub struct IccSlot {
    dir: PathBuf,
}

impl IccSlot {
    fn profile(&self) -> PathBuf {
        self.dir.join("profile.icc")
    }

    fn definition(&self) -> PathBuf {
        self.dir.join("PDFA_def.ps")
    }

    /// Writes the slot files if they are not there yet.
    async fn prepare(&self, source_profile: &Path) -> Result<(), ConverterError> {
        if self.definition().exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).await?;
        fs::copy(source_profile, self.profile()).await?;
        fs::write(self.definition(), pdfa_definition(&self.profile())).await?;
        debug!(slot = %self.dir.display(), "Prepared ICC profile slot");
        Ok(())
    }
}

/// Escapes a string for use inside a PostScript `( )` literal.
fn ps_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// PDF/A definition attaching `profile` as the sRGB output intent.
fn pdfa_definition(profile: &Path) -> String {
    format!(
        r#"%!
/ICCProfile ({}) def
[/_objdef {{icc_PDFA}} /type /stream /OBJ pdfmark
[{{icc_PDFA}} << /N 3 >> /PUT pdfmark
[{{icc_PDFA}} ICCProfile (r) file /PUT pdfmark
[/_objdef {{OutputIntent_PDFA}} /type /dict /OBJ pdfmark
[{{OutputIntent_PDFA}} <<
  /Type /OutputIntent
  /S /GTS_PDFA1
  /DestOutputProfile {{icc_PDFA}}
  /OutputConditionIdentifier (sRGB)
>> /PUT pdfmark
[{{Catalog}} << /OutputIntents [ {{OutputIntent_PDFA}} ] >> /PUT pdfmark
"#,
        ps_string(&profile.to_string_lossy())
    )
}

/// Converts PDF and PostScript: to PDF/A, PostScript to PDF, PDF pages to
/// images. Also merges PDFs.
pub struct GhostscriptConverter {
    config: GhostscriptConfig,
    capability: ConverterCapability,
    icc_slots: ResourcePool<IccSlot>,
}

impl GhostscriptConverter {
    /// `pool_size` is the number of ICC slots, normally the worker count.
    /// The slots live under `scratch_dir`, which the run removes at the end.
    pub fn new(config: GhostscriptConfig, pool_size: usize, scratch_dir: &Path) -> Self {
        let pdf_inputs: Vec<&str> = PDF_VERSIONS.iter().chain(PDF_A_VERSIONS).copied().collect();

        let mut capability = ConverterCapability::new()
            .with_conversions(POSTSCRIPT, &[PDF_1_7])
            .with_conversions(&pdf_inputs, PAGE_IMAGES)
            .with_merge(&pdf_inputs, PDF_1_7);

        if config.icc_profile.is_some() {
            let sources: Vec<&str> = PDF_VERSIONS.iter().chain(POSTSCRIPT).copied().collect();
            capability = capability.with_conversions(&sources, PDFA_TARGETS);
        }

        let root = scratch_dir.join("icc");
        let icc_slots = ResourcePool::filled(pool_size.max(1), |i| IccSlot {
            dir: root.join(format!("slot-{}", i)),
        });

        Self {
            config,
            capability,
            icc_slots,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GhostscriptConfig::default(), 1, &RunConfig::default().temp_dir)
    }

    fn base_args(device: &str, output: &Path) -> Vec<String> {
        vec![
            "-dBATCH".to_string(),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            format!("-sDEVICE={}", device),
            format!("-sOutputFile={}", output.to_string_lossy()),
        ]
    }

    fn pdfa_args(part: u8, definition: &Path, input: &Path, output: &Path) -> Vec<String> {
        let mut args = Self::base_args("pdfwrite", output);
        args.extend([
            format!("-dPDFA={}", part),
            "-dPDFACompatibilityPolicy=1".to_string(),
            "-dNOOUTERSAVE".to_string(),
            "-sColorConversionStrategy=RGB".to_string(),
            "-sProcessColorModel=DeviceRGB".to_string(),
            // The definition file reads the profile from disk.
            format!("--permit-file-read={}", definition.parent().unwrap_or(definition).to_string_lossy()),
            definition.to_string_lossy().to_string(),
            input.to_string_lossy().to_string(),
        ]);
        args
    }

    fn pdf_args(input: &Path, output: &Path) -> Vec<String> {
        let mut args = Self::base_args("pdfwrite", output);
        args.extend([
            "-dSAFER".to_string(),
            "-dCompatibilityLevel=1.7".to_string(),
            input.to_string_lossy().to_string(),
        ]);
        args
    }

    fn page_args(&self, device: &str, input: &Path, pattern: &Path) -> Vec<String> {
        let mut args = Self::base_args(device, pattern);
        args.extend([
            "-dSAFER".to_string(),
            format!("-r{}", self.config.render_dpi),
            input.to_string_lossy().to_string(),
        ]);
        args
    }

    async fn to_pdfa(&self, job: &HopJob, part: u8) -> Result<HopOutput, ConverterError> {
        let source = self.config.icc_profile.as_ref().ok_or_else(|| {
            ConverterError::UnsupportedConversion {
                from: job.from.clone(),
                to: job.to.clone(),
            }
        })?;

        let slot = self
            .icc_slots
            .checkout()
            .await
            .ok_or_else(|| ConverterError::conversion_failed("no ICC profile slot available", None))?;
        slot.prepare(source).await?;

        let output = job.output_path("pdf");
        let args = Self::pdfa_args(part, &slot.definition(), &job.input, &output);
        run_tool(self.name(), &self.config.gs_path, &args, None).await?;
        Ok(HopOutput::single(output))
    }

    async fn to_pages(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        let (device, extension) = if job.to.as_str() == TIFF {
            ("tiff24nc", "tif")
        } else {
            ("png16m", "png")
        };
        let pattern = job
            .work_dir
            .join(format!("{}-%03d.{}", job.stem(), extension));
        let args = self.page_args(device, &job.input, &pattern);
        run_tool(self.name(), &self.config.gs_path, &args, None).await?;

        let files = list_outputs(&job.work_dir, extension).await?;
        Ok(HopOutput {
            files,
            attachments: Vec::new(),
        })
    }
}

#[async_trait]
impl Converter for GhostscriptConverter {
    fn name(&self) -> &str {
        "ghostscript"
    }

    fn capability(&self) -> &ConverterCapability {
        &self.capability
    }

    async fn dependencies_satisfied(&self) -> bool {
        if let Some(ref profile) = self.config.icc_profile {
            if !profile.exists() {
                return false;
            }
        }
        tool_available(&self.config.gs_path, "--version").await
    }

    async fn convert(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        ensure_input(&job.input)?;
        if !self.supports_conversion(&job.from, &job.to) {
            return Err(ConverterError::UnsupportedConversion {
                from: job.from.clone(),
                to: job.to.clone(),
            });
        }

        let target = job.to.as_str();
        if let Some(part) = pdfa_part(target) {
            return self.to_pdfa(job, part).await;
        }
        if PAGE_IMAGES.contains(&target) {
            return self.to_pages(job).await;
        }

        let output = job.output_path("pdf");
        run_tool(
            self.name(),
            &self.config.gs_path,
            &Self::pdf_args(&job.input, &output),
            None,
        )
        .await?;
        Ok(HopOutput::single(output))
    }

    async fn merge(&self, job: &MergeJob) -> Result<(), ConverterError> {
        if !self.capability.can_merge(&job.format) {
            return Err(ConverterError::merge_failed(format!(
                "cannot merge {} files",
                job.format
            )));
        }

        let mut args = Self::base_args("pdfwrite", &job.output);
        args.push("-dSAFER".to_string());
        args.extend(job.inputs.iter().map(|p| p.to_string_lossy().to_string()));

        run_tool(self.name(), &self.config.gs_path, &args, None)
            .await
            .map(|_| ())
            .map_err(|e| ConverterError::merge_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_profile() -> GhostscriptConverter {
        GhostscriptConverter::new(
            GhostscriptConfig {
                icc_profile: Some(PathBuf::from("/usr/share/color/icc/sRGB.icc")),
                ..Default::default()
            },
            2,
            Path::new("/tmp/archivist-test"),
        )
    }

    #[test]
    fn test_pdfa_needs_profile() {
        let plain = GhostscriptConverter::with_defaults();
        assert!(!plain.supports_conversion(&PDF_1_4.into(), &PDF_A_2B.into()));
        assert!(plain.supports_conversion(&POSTSCRIPT_3.into(), &PDF_1_7.into()));
        assert!(plain.supports_conversion(&PDF_1_7.into(), &PNG_1_2.into()));

        let converter = with_profile();
        assert!(converter.supports_conversion(&PDF_1_4.into(), &PDF_A_2B.into()));
        assert!(converter.supports_conversion(&EPS_3.into(), &PDF_A_1B.into()));
        assert!(!converter.supports_conversion(&PDF_A_2B.into(), &PDF_A_1B.into()));
        assert!(converter.blocking_conversions().is_empty());
        assert_eq!(converter.icc_slots.capacity(), 2);
    }

    #[test]
    fn test_merge_capability() {
        let converter = GhostscriptConverter::with_defaults();
        assert!(converter.capability().can_merge(&PDF_1_4.into()));
        assert!(converter.capability().can_merge(&PDF_A_2B.into()));
        assert!(!converter.capability().can_merge(&PNG_1_2.into()));
    }

    #[test]
    fn test_pdfa_args() {
        let args = GhostscriptConverter::pdfa_args(
            2,
            Path::new("/tmp/slot-0/PDFA_def.ps"),
            Path::new("/out/a.pdf"),
            Path::new("/tmp/work/a.pdf"),
        );
        assert!(args.contains(&"-dPDFA=2".to_string()));
        assert!(args.contains(&"-sDEVICE=pdfwrite".to_string()));
        assert!(args.contains(&"-sOutputFile=/tmp/work/a.pdf".to_string()));
        assert!(args.contains(&"--permit-file-read=/tmp/slot-0".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/a.pdf"));
    }

    #[test]
    fn test_pdfa_definition_escapes_path() {
        let def = pdfa_definition(Path::new("/icc/(s)RGB.icc"));
        assert!(def.contains(r"/ICCProfile (/icc/\(s\)RGB.icc) def"));
        assert!(def.contains("/GTS_PDFA1"));
    }

    #[tokio::test]
    async fn test_slot_prepare_copies_profile() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("srgb.icc");
        fs::write(&source, b"icc-bytes").await.unwrap();

        let slot = IccSlot {
            dir: dir.path().join("slot-0"),
        };
        slot.prepare(&source).await.unwrap();
        assert_eq!(fs::read(slot.profile()).await.unwrap(), b"icc-bytes");
        let def = fs::read_to_string(slot.definition()).await.unwrap();
        assert!(def.contains("profile.icc"));

        // Second call leaves the slot alone.
        slot.prepare(Path::new("/nonexistent.icc")).await.unwrap();
    }

    #[tokio::test]
    async fn test_slots_live_in_run_scratch() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("srgb.icc");
        fs::write(&source, b"icc-bytes").await.unwrap();
        let scratch = dir.path().join("run-1");

        let converter = GhostscriptConverter::new(
            GhostscriptConfig {
                icc_profile: Some(source.clone()),
                ..Default::default()
            },
            2,
            &scratch,
        );
        let slot = converter.icc_slots.checkout().await.unwrap();
        slot.prepare(&source).await.unwrap();

        assert!(slot.dir.starts_with(scratch.join("icc")));
        assert!(slot.definition().exists());
        drop(slot);

        fs::remove_dir_all(&scratch).await.unwrap();
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_missing_profile_unsatisfied() {
        let converter = GhostscriptConverter::new(
            GhostscriptConfig {
                icc_profile: Some(PathBuf::from("/nonexistent/profile.icc")),
                ..Default::default()
            },
            1,
            Path::new("/tmp/archivist-test"),
        );
        assert!(!converter.dependencies_satisfied().await);
    }
}
