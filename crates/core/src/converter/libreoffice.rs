//! Office documents through a headless LibreOffice.

use async_trait::async_trait;
use std::path::PathBuf;

use super::capability::ConverterCapability;
use super::config::LibreOfficeConfig;
use super::error::ConverterError;
use super::placement::list_outputs;
use super::process::{run_tool, tool_available};
use super::traits::{ensure_input, Converter, HopJob, HopOutput};
use crate::formats::pronom::*;

const TEXT_DOCUMENTS: &[&str] = &[WORD_97, DOCX, ODT_1_2, RTF_1_9, PLAIN_TEXT];
const SPREADSHEETS: &[&str] = &[EXCEL_97, XLSX, ODS_1_2];
const PRESENTATIONS: &[&str] = &[POWERPOINT_97, PPTX, ODP_1_2];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFamily {
    Text,
    Spreadsheet,
    Presentation,
}

impl DocumentFamily {
    fn of(code: &str) -> Option<Self> {
        if TEXT_DOCUMENTS.contains(&code) {
            Some(Self::Text)
        } else if SPREADSHEETS.contains(&code) {
            Some(Self::Spreadsheet)
        } else if PRESENTATIONS.contains(&code) {
            Some(Self::Presentation)
        } else {
            None
        }
    }

    fn pdf_filter(&self) -> &'static str {
        match self {
            Self::Text => "writer_pdf_Export",
            Self::Spreadsheet => "calc_pdf_Export",
            Self::Presentation => "impress_pdf_Export",
        }
    }
}

/// `--convert-to` argument for a target format.
fn convert_to_arg(family: DocumentFamily, target: &str) -> Option<String> {
    let arg = match target {
        DOCX => "docx:MS Word 2007 XML".to_string(),
        ODT_1_2 => "odt".to_string(),
        XLSX => "xlsx:Calc MS Excel 2007 XML".to_string(),
        ODS_1_2 => "ods".to_string(),
        PPTX => "pptx:Impress MS PowerPoint 2007 XML".to_string(),
        ODP_1_2 => "odp".to_string(),
        PDF_1_7 => format!("pdf:{}", family.pdf_filter()),
        PDF_A_2B => format!(
            "pdf:{}:{{\"SelectPdfVersion\":{{\"type\":\"long\",\"value\":\"2\"}}}}",
            family.pdf_filter()
        ),
        _ => return None,
    };
    Some(arg)
}

/// Converts office documents. Every conversion is blocking: concurrent
/// `soffice` processes sharing one user profile interfere with each other.
pub struct LibreOfficeConverter {
    config: LibreOfficeConfig,
    capability: ConverterCapability,
}

impl LibreOfficeConverter {
    pub fn new(config: LibreOfficeConfig) -> Self {
        let capability = ConverterCapability::new()
            .with_blocking(TEXT_DOCUMENTS, &[DOCX, ODT_1_2, PDF_1_7, PDF_A_2B])
            .with_blocking(SPREADSHEETS, &[XLSX, ODS_1_2, PDF_1_7, PDF_A_2B])
            .with_blocking(PRESENTATIONS, &[PPTX, ODP_1_2, PDF_1_7, PDF_A_2B]);
        Self { config, capability }
    }

    pub fn with_defaults() -> Self {
        Self::new(LibreOfficeConfig::default())
    }

    fn build_args(&self, job: &HopJob) -> Result<Vec<String>, ConverterError> {
        let unsupported = || ConverterError::UnsupportedConversion {
            from: job.from.clone(),
            to: job.to.clone(),
        };
        let family = DocumentFamily::of(job.from.as_str()).ok_or_else(unsupported)?;
        let convert_to = convert_to_arg(family, job.to.as_str()).ok_or_else(unsupported)?;

        Ok(vec![
            "--headless".to_string(),
            "--norestore".to_string(),
            "--convert-to".to_string(),
            convert_to,
            "--outdir".to_string(),
            job.work_dir.to_string_lossy().to_string(),
            job.input.to_string_lossy().to_string(),
        ])
    }
}

#[async_trait]
impl Converter for LibreOfficeConverter {
    fn name(&self) -> &str {
        "libreoffice"
    }

    fn capability(&self) -> &ConverterCapability {
        &self.capability
    }

    async fn dependencies_satisfied(&self) -> bool {
        tool_available(&self.config.soffice_path, "--version").await
    }

    async fn convert(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        ensure_input(&job.input)?;
        let args = self.build_args(job)?;
        run_tool(self.name(), &self.config.soffice_path, &args, None).await?;

        // soffice names the output after the input stem.
        let extension = extension(job.to.as_str()).unwrap_or("pdf");
        let expected: PathBuf = job.output_path(extension);
        if expected.exists() {
            return Ok(HopOutput::single(expected));
        }

        let files = list_outputs(&job.work_dir, extension).await?;
        if files.is_empty() {
            return Err(ConverterError::NoOutput {
                dir: job.work_dir.clone(),
            });
        }
        Ok(HopOutput {
            files,
            attachments: Vec::new(),
        })
    }
}
