//! Mock converter for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::mock_identifier::MockIdentifier;
use crate::converter::{
    Converter, ConverterCapability, ConverterError, HopJob, HopOutput, MergeJob,
};
use crate::formats::{pronom, FormatCode};

/// A recorded conversion attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// The job that was submitted.
    pub job: HopJob,
    /// Whether the attempt produced output.
    pub success: bool,
}

#[derive(Debug, Default)]
struct MockState {
    conversions: Vec<RecordedConversion>,
    merges: Vec<MergeJob>,
    /// Attempts still to fail.
    fail_next: u32,
}

/// Decrements the in-flight counter even when the attempt is cancelled.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the Converter trait.
///
/// Outputs are tagged files understood by [`MockIdentifier`], so dispatch
/// verification works against them. Provides controllable behavior for
/// testing:
/// - Declared conversions, blocking pairs and fixed chains
/// - Injected failures, delays and wrong output formats
/// - Split outputs and extracted attachments
/// - Recorded attempts and the peak number of concurrent attempts
///
/// # Example
///
/// ```rust,ignore
/// use archivist_core::testing::MockConverter;
///
/// let converter = MockConverter::new("office")
///     .with_blocking("fmt/40", "fmt/412")
///     .with_delay(Duration::from_millis(50));
///
/// converter.fail_next(1).await;
/// // ... run the scheduler ...
/// assert_eq!(converter.max_concurrent(), 1);
/// ```
#[derive(Debug)]
pub struct MockConverter {
    name: String,
    capability: ConverterCapability,
    dependencies: bool,
    delay: Duration,
    extension: Option<String>,
    wrong_output: Option<FormatCode>,
    split: usize,
    attachments: Vec<(String, FormatCode)>,
    state: Arc<RwLock<MockState>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockConverter {
    /// Create a new mock converter supporting nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capability: ConverterCapability::new(),
            dependencies: true,
            delay: Duration::ZERO,
            extension: None,
            wrong_output: None,
            split: 1,
            attachments: Vec::new(),
            state: Arc::new(RwLock::new(MockState::default())),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Replace the whole capability.
    pub fn with_capability(mut self, capability: ConverterCapability) -> Self {
        self.capability = capability;
        self
    }

    pub fn with_conversion(mut self, from: &str, to: &str) -> Self {
        self.capability = self.capability.with_conversions(&[from], &[to]);
        self
    }

    pub fn with_blocking(mut self, from: &str, to: &str) -> Self {
        self.capability = self.capability.with_blocking(&[from], &[to]);
        self
    }

    pub fn with_chain(mut self, source: &str, hops: &[&str]) -> Self {
        self.capability = self.capability.with_chain(source, hops);
        self
    }

    pub fn with_merge(mut self, inputs: &[&str], output: &str) -> Self {
        self.capability = self.capability.with_merge(inputs, output);
        self
    }

    /// Report dependencies as (un)satisfied.
    pub fn with_dependencies(mut self, satisfied: bool) -> Self {
        self.dependencies = satisfied;
        self
    }

    /// Simulated duration of every attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Output file extension. Defaults to the conventional extension of the
    /// hop format.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_string());
        self
    }

    /// Tag outputs with this format instead of the hop format.
    pub fn with_wrong_output(mut self, format: &str) -> Self {
        self.wrong_output = Some(FormatCode::from(format));
        self
    }

    /// Produce `pages` output files per attempt.
    pub fn with_split(mut self, pages: usize) -> Self {
        self.split = pages.max(1);
        self
    }

    /// Extract an attachment named `name` tagged `format` on every attempt.
    pub fn with_attachment(mut self, name: &str, format: &str) -> Self {
        self.attachments
            .push((name.to_string(), FormatCode::from(format)));
        self
    }

    /// Fail the next `attempts` attempts.
    pub async fn fail_next(&self, attempts: u32) {
        self.state.write().await.fail_next = attempts;
    }

    /// Get all recorded conversion attempts.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.state.read().await.conversions.clone()
    }

    /// Get the number of conversion attempts performed.
    pub async fn conversion_count(&self) -> usize {
        self.state.read().await.conversions.len()
    }

    /// Get all recorded merges.
    pub async fn recorded_merges(&self) -> Vec<MergeJob> {
        self.state.read().await.merges.clone()
    }

    /// Peak number of attempts running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn output_extension(&self, format: &FormatCode) -> String {
        self.extension
            .clone()
            .or_else(|| pronom::extension(format.as_str()).map(str::to_string))
            .unwrap_or_else(|| "out".to_string())
    }

    async fn write_outputs(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        let format = self.wrong_output.clone().unwrap_or_else(|| job.to.clone());
        let extension = self.output_extension(&job.to);

        let mut files = Vec::with_capacity(self.split);
        if self.split == 1 {
            files.push(job.output_path(&extension));
        } else {
            for page in 1..=self.split {
                files.push(
                    job.work_dir
                        .join(format!("{}-{:03}.{}", job.stem(), page, extension)),
                );
            }
        }
        for file in &files {
            MockIdentifier::write_tagged(file, format.as_str()).await?;
        }

        let mut attachments = Vec::with_capacity(self.attachments.len());
        for (name, format) in &self.attachments {
            let path: PathBuf = job.work_dir.join("attachments").join(name);
            MockIdentifier::write_tagged(&path, format.as_str()).await?;
            attachments.push(path);
        }

        Ok(HopOutput { files, attachments })
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> &ConverterCapability {
        &self.capability
    }

    async fn dependencies_satisfied(&self) -> bool {
        self.dependencies
    }

    async fn convert(&self, job: &HopJob) -> Result<HopOutput, ConverterError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        let index = {
            let mut state = self.state.write().await;
            state.conversions.push(RecordedConversion {
                job: job.clone(),
                success: false,
            });
            state.conversions.len() - 1
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail = {
            let mut state = self.state.write().await;
            if state.fail_next > 0 {
                state.fail_next -= 1;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(ConverterError::conversion_failed("injected failure", None));
        }

        if !self.capability.supports(&job.from, &job.to) {
            return Err(ConverterError::UnsupportedConversion {
                from: job.from.clone(),
                to: job.to.clone(),
            });
        }

        let output = self.write_outputs(job).await?;
        if let Some(recorded) = self.state.write().await.conversions.get_mut(index) {
            recorded.success = true;
        }
        Ok(output)
    }

    async fn merge(&self, job: &MergeJob) -> Result<(), ConverterError> {
        self.state.write().await.merges.push(job.clone());

        let fail = {
            let mut state = self.state.write().await;
            if state.fail_next > 0 {
                state.fail_next -= 1;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(ConverterError::merge_failed("injected failure"));
        }

        let output = match self.capability.merge_output() {
            Some(output) if self.capability.can_merge(&job.format) => output.clone(),
            _ => {
                return Err(ConverterError::merge_failed(format!(
                    "cannot merge {} files",
                    job.format
                )))
            }
        };
        MockIdentifier::write_tagged(&job.output, output.as_str()).await?;
        Ok(())
    }
}

/// Reads the tag of a file written by the mocks.
pub async fn read_tag(path: &Path) -> Option<FormatCode> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    MockIdentifier::parse_tag(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn job(dir: &Path, from: &str, to: &str) -> HopJob {
        HopJob {
            file_id: Uuid::new_v4(),
            input: dir.join("letter.doc"),
            from: from.into(),
            to: to.into(),
            work_dir: dir.join("work"),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_writes_tagged_output() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new("mock").with_conversion("fmt/40", "fmt/412");

        let output = converter
            .convert(&job(dir.path(), "fmt/40", "fmt/412"))
            .await
            .unwrap();
        assert_eq!(output.files, vec![dir.path().join("work/letter.docx")]);
        assert_eq!(
            read_tag(&output.files[0]).await.unwrap().as_str(),
            "fmt/412"
        );

        let recorded = converter.recorded_conversions().await;
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].success);
    }

    #[tokio::test]
    async fn test_fail_next() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new("mock").with_conversion("fmt/40", "fmt/412");
        converter.fail_next(1).await;

        assert!(converter
            .convert(&job(dir.path(), "fmt/40", "fmt/412"))
            .await
            .is_err());
        assert!(converter
            .convert(&job(dir.path(), "fmt/40", "fmt/412"))
            .await
            .is_ok());
        let recorded = converter.recorded_conversions().await;
        assert!(!recorded[0].success);
        assert!(recorded[1].success);
    }

    #[tokio::test]
    async fn test_split_and_wrong_output() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new("mock")
            .with_conversion("fmt/276", "fmt/13")
            .with_split(2)
            .with_wrong_output("fmt/44");

        let output = converter
            .convert(&job(dir.path(), "fmt/276", "fmt/13"))
            .await
            .unwrap();
        assert_eq!(output.files.len(), 2);
        assert!(output.files[0].ends_with("letter-001.png"));
        assert_eq!(read_tag(&output.files[1]).await.unwrap().as_str(), "fmt/44");
    }

    #[tokio::test]
    async fn test_cancelled_attempt_releases_active_count() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new("mock")
            .with_conversion("fmt/40", "fmt/412")
            .with_delay(Duration::from_millis(200));

        let job = job(dir.path(), "fmt/40", "fmt/412");
        let result =
            tokio::time::timeout(Duration::from_millis(10), converter.convert(&job)).await;
        assert!(result.is_err());
        assert_eq!(converter.max_concurrent(), 1);
        assert_eq!(converter.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_merge_writes_merge_output() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new("mock").with_merge(&["fmt/13"], "fmt/276");
        let job = MergeJob {
            inputs: vec![dir.path().join("a.png"), dir.path().join("b.png")],
            format: "fmt/13".into(),
            output: dir.path().join("merged.pdf"),
        };
        converter.merge(&job).await.unwrap();
        assert_eq!(read_tag(&job.output).await.unwrap().as_str(), "fmt/276");
        assert_eq!(converter.recorded_merges().await.len(), 1);
    }
}
