//! E-mail through `msgconvert` and an e-mail to PDF converter jar.

use async_trait::async_trait;
use std::path::PathBuf;

use super::capability::ConverterCapability;
use super::config::EmailConfig;
use super::error::ConverterError;
use super::placement::list_outputs;
use super::process::{run_tool, tool_available};
use super::traits::{ensure_input, Converter, HopJob, HopOutput};
use crate::formats::pronom::*;

/// The e-mail converter jar renders through wkhtmltopdf, which writes PDF 1.4.
const MAIL_PDF: &str = PDF_1_4;

const MAIL_SOURCES: &[&str] = &[EML, EML_INTERNET_MESSAGE];

/// Converts Outlook messages to EML and EML to PDF, extracting attachments.
///
/// Outlook messages reach PDF through the fixed chain msg -> eml -> pdf.
pub struct EmailConverter {
    config: EmailConfig,
    capability: ConverterCapability,
}

impl EmailConverter {
    pub fn new(config: EmailConfig) -> Self {
        let mut capability =
            ConverterCapability::new().with_conversions(&[OUTLOOK_MSG], &[EML]);
        if config.jar_path.is_some() {
            capability = capability
                .with_conversions(MAIL_SOURCES, &[MAIL_PDF])
                .with_chain(OUTLOOK_MSG, &[EML, MAIL_PDF]);
        }
        Self { config, capability }
    }

    pub fn with_defaults() -> Self {
        Self::new(EmailConfig::default())
    }

    fn jar_args(jar: &std::path::Path, job: &HopJob, output: &std::path::Path) -> Vec<String> {
        vec![
            "-jar".to_string(),
            jar.to_string_lossy().to_string(),
            "--extract-attachments".to_string(),
            "--output-filepath".to_string(),
            output.to_string_lossy().to_string(),
            job.input.to_string_lossy().to_string(),
        ]
    }

    async fn msg_to_eml(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        let output = job.output_path("eml");
        let args = [
            "--outfile".to_string(),
            output.to_string_lossy().to_string(),
            job.input.to_string_lossy().to_string(),
        ];
        run_tool("msgconvert", &self.config.msgconvert_path, &args, None).await?;
        Ok(HopOutput::single(output))
    }

    async fn eml_to_pdf(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        let jar = self.config.jar_path.as_ref().ok_or_else(|| {
            ConverterError::UnsupportedConversion {
                from: job.from.clone(),
                to: job.to.clone(),
            }
        })?;

        let output = job.output_path("pdf");
        run_tool(
            self.name(),
            &self.config.java_path,
            &Self::jar_args(jar, job, &output),
            Some(&job.work_dir),
        )
        .await?;

        // Attachments land in `<stem>-attachments/` beside the PDF.
        let attachment_dir: PathBuf = job.work_dir.join(format!("{}-attachments", job.stem()));
        let mut attachments = Vec::new();
        if attachment_dir.is_dir() {
            let mut entries = tokio::fs::read_dir(&attachment_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    attachments.push(entry.path());
                }
            }
            attachments.sort();
        }

        let files = if output.exists() {
            vec![output]
        } else {
            list_outputs(&job.work_dir, "pdf").await?
        };

        Ok(HopOutput { files, attachments })
    }
}

#[async_trait]
impl Converter for EmailConverter {
    fn name(&self) -> &str {
        "email"
    }

    fn capability(&self) -> &ConverterCapability {
        &self.capability
    }

    async fn dependencies_satisfied(&self) -> bool {
        if !tool_available(&self.config.msgconvert_path, "--help").await {
            return false;
        }
        match self.config.jar_path {
            Some(ref jar) => jar.exists() && tool_available(&self.config.java_path, "-version").await,
            None => true,
        }
    }

    async fn convert(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        ensure_input(&job.input)?;
        match (job.from.as_str(), job.to.as_str()) {
            (OUTLOOK_MSG, EML) => self.msg_to_eml(job).await,
            (from, MAIL_PDF) if MAIL_SOURCES.contains(&from) => self.eml_to_pdf(job).await,
            _ => Err(ConverterError::UnsupportedConversion {
                from: job.from.clone(),
                to: job.to.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatCode;
    use uuid::Uuid;

    fn with_jar() -> EmailConverter {
        EmailConverter::new(EmailConfig {
            jar_path: Some(PathBuf::from("/opt/emailconverter.jar")),
            ..Default::default()
        })
    }

    #[test]
    fn test_pdf_only_with_jar() {
        let plain = EmailConverter::with_defaults();
        assert!(plain.supports_conversion(&OUTLOOK_MSG.into(), &EML.into()));
        assert!(!plain.supports_conversion(&EML.into(), &MAIL_PDF.into()));
        assert!(plain.capability().fixed_chains().is_empty());

        let converter = with_jar();
        assert!(converter.supports_conversion(&EML.into(), &MAIL_PDF.into()));
        assert!(converter.supports_conversion(&EML_INTERNET_MESSAGE.into(), &MAIL_PDF.into()));
        let chain = &converter.capability().fixed_chains()[0];
        assert_eq!(chain.source.as_str(), OUTLOOK_MSG);
        assert_eq!(chain.hops, vec![FormatCode::from(EML), FormatCode::from(MAIL_PDF)]);
    }

    #[test]
    fn test_jar_args() {
        let job = HopJob {
            file_id: Uuid::new_v4(),
            input: PathBuf::from("/out/mail/hello.eml"),
            from: EML.into(),
            to: MAIL_PDF.into(),
            work_dir: PathBuf::from("/tmp/work"),
            attempt: 1,
        };
        let args = EmailConverter::jar_args(
            std::path::Path::new("/opt/emailconverter.jar"),
            &job,
            &job.output_path("pdf"),
        );
        assert_eq!(args[0], "-jar");
        assert!(args.contains(&"--extract-attachments".to_string()));
        assert!(args.contains(&"/tmp/work/hello.pdf".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/mail/hello.eml"));
    }

    #[tokio::test]
    async fn test_unsupported_pair() {
        let converter = with_jar();
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("a.eml");
        tokio::fs::write(&input, b"From: a@b").await.unwrap();
        let job = HopJob {
            file_id: Uuid::new_v4(),
            input,
            from: EML.into(),
            to: PDF_A_2B.into(),
            work_dir: dir.path().to_path_buf(),
            attempt: 1,
        };
        assert!(matches!(
            converter.convert(&job).await,
            Err(ConverterError::UnsupportedConversion { .. })
        ));
    }
}
