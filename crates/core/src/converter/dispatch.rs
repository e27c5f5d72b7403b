//! Running one hop for one file: blocking section, per-attempt timeout,
//! bounded retry, independent verification and placement of the outputs.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::ConverterError;
use super::placement::{move_file, unique_destination};
use super::registry::RegisteredConverter;
use super::retry::{retry, RetryConfig};
use super::traits::{HopJob, HopOutput};
use crate::config::RunConfig;
use crate::formats::FormatCode;
use crate::identifier::{FileIdentity, Identifier};
use crate::metrics::{HOPS_TOTAL, HOP_ATTEMPTS, HOP_DURATION};
use crate::registry::FileRegistry;

/// Dispatch settings shared by every hop of a run.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub retry: RetryConfig,
    /// Wall-clock limit for one attempt.
    pub hop_timeout: Duration,
    /// Root of the per-attempt scratch directories.
    pub temp_dir: PathBuf,
}

impl DispatchSettings {
    pub fn from_run_config(run: &RunConfig) -> Self {
        Self {
            retry: RetryConfig::default().with_max_attempts(run.max_attempts),
            hop_timeout: run.hop_timeout(),
            temp_dir: run.temp_dir.clone(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_hop_timeout(mut self, hop_timeout: Duration) -> Self {
        self.hop_timeout = hop_timeout;
        self
    }

    fn file_dir(&self, file_id: Uuid) -> PathBuf {
        self.temp_dir.join(file_id.to_string())
    }

    fn attempt_dir(&self, file_id: Uuid, attempt: u32) -> PathBuf {
        self.file_dir(file_id).join(format!("attempt-{}", attempt))
    }
}

/// The hop to run.
#[derive(Debug, Clone)]
pub struct HopRequest {
    pub file_id: Uuid,
    pub input: PathBuf,
    pub from: FormatCode,
    pub to: FormatCode,
}

/// A verified output at its final location.
#[derive(Debug, Clone)]
pub struct PlacedFile {
    pub path: PathBuf,
    pub identity: FileIdentity,
}

#[derive(Debug)]
pub struct HopSuccess {
    pub converter: String,
    /// Verified outputs; the first one replaced the input in the record.
    pub outputs: Vec<PlacedFile>,
    /// Extracted attachments, not yet identified.
    pub attachments: Vec<PathBuf>,
    pub attempts: u32,
}

impl HopSuccess {
    pub fn is_split(&self) -> bool {
        self.outputs.len() > 1
    }
}

#[derive(Debug)]
pub struct HopFailure {
    pub converter: String,
    pub attempts: u32,
    pub error: ConverterError,
}

/// Converts `request.input` one hop further.
///
/// Each attempt runs the converter under the timeout (inside the blocking
/// section when the pair is blocking), then re-identifies every produced file.
/// An attempt only succeeds when each output identifies as `request.to`.
///
/// On success the outputs are moved next to the input, the input is deleted
/// and the record is repointed to the first output. When every attempt fails
/// the record is flagged `failed` and the input is left as it was.
pub async fn convert_file(
    converter: &RegisteredConverter,
    identifier: &dyn Identifier,
    registry: &FileRegistry,
    settings: &DispatchSettings,
    request: &HopRequest,
) -> Result<HopSuccess, HopFailure> {
    let name = converter.name().to_string();
    let started = Instant::now();
    let mut last_attempt = 0;

    debug!(
        file_id = %request.file_id,
        converter = %name,
        from = %request.from,
        to = %request.to,
        "Dispatching hop"
    );

    let result = retry(&settings.retry, |attempt| {
        last_attempt = attempt;
        attempt_hop(converter, identifier, settings, request, attempt)
    })
    .await;

    HOP_DURATION
        .with_label_values(&[name.as_str()])
        .observe(started.elapsed().as_secs_f64());

    let outcome = match result {
        Ok((output, identities)) => {
            place_outputs(request, output, identities)
                .await
                .map(|(outputs, attachments)| (outputs, attachments, last_attempt))
                .map_err(|error| (error, last_attempt))
        }
        Err(e) => Err((e.error, e.attempts)),
    };

    remove_dir_quietly(&settings.file_dir(request.file_id)).await;

    match outcome {
        Ok((outputs, attachments, attempts)) => {
            let split = outputs.len() > 1;
            let new_path = outputs[0].path.clone();
            registry
                .update(&request.file_id, |record| {
                    record.complete_hop(new_path, request.to.clone(), &name);
                    if split {
                        record.flags.is_part_of_split = true;
                    }
                })
                .await;

            HOPS_TOTAL.with_label_values(&[name.as_str(), "success"]).inc();
            info!(
                file_id = %request.file_id,
                converter = %name,
                to = %request.to,
                attempts,
                outputs = outputs.len(),
                attachments = attachments.len(),
                "Hop completed"
            );

            Ok(HopSuccess {
                converter: name,
                outputs,
                attachments,
                attempts,
            })
        }
        Err((error, attempts)) => {
            registry
                .update(&request.file_id, |record| record.flags.failed = true)
                .await;

            HOPS_TOTAL.with_label_values(&[name.as_str(), "failed"]).inc();
            warn!(
                file_id = %request.file_id,
                converter = %name,
                from = %request.from,
                to = %request.to,
                attempts,
                error = %error,
                "Hop failed"
            );

            Err(HopFailure {
                converter: name,
                attempts,
                error,
            })
        }
    }
}

async fn attempt_hop(
    converter: &RegisteredConverter,
    identifier: &dyn Identifier,
    settings: &DispatchSettings,
    request: &HopRequest,
    attempt: u32,
) -> Result<(HopOutput, Vec<FileIdentity>), ConverterError> {
    let work_dir = settings.attempt_dir(request.file_id, attempt);
    let result = run_attempt(converter, identifier, settings, request, attempt, &work_dir).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(ConverterError::Timeout { .. }) => "timeout",
        Err(ConverterError::VerificationFailed { .. }) => "verification_failed",
        Err(_) => "error",
    };
    HOP_ATTEMPTS
        .with_label_values(&[converter.name(), outcome])
        .inc();

    if result.is_err() {
        remove_dir_quietly(&work_dir).await;
    }
    result
}

async fn run_attempt(
    converter: &RegisteredConverter,
    identifier: &dyn Identifier,
    settings: &DispatchSettings,
    request: &HopRequest,
    attempt: u32,
    work_dir: &Path,
) -> Result<(HopOutput, Vec<FileIdentity>), ConverterError> {
    if !request.input.exists() {
        return Err(ConverterError::InputNotFound {
            path: request.input.clone(),
        });
    }

    remove_dir_quietly(work_dir).await;
    fs::create_dir_all(work_dir)
        .await
        .map_err(|_| ConverterError::OutputDirectoryFailed {
            path: work_dir.to_path_buf(),
        })?;

    let job = HopJob {
        file_id: request.file_id,
        input: request.input.clone(),
        from: request.from.clone(),
        to: request.to.clone(),
        work_dir: work_dir.to_path_buf(),
        attempt,
    };

    let output = {
        let _section = converter.enter(&request.from, &request.to).await;
        timeout(settings.hop_timeout, converter.converter().convert(&job))
            .await
            .map_err(|_| ConverterError::Timeout {
                timeout_secs: settings.hop_timeout.as_secs(),
            })??
    };

    if output.files.is_empty() {
        return Err(ConverterError::NoOutput {
            dir: work_dir.to_path_buf(),
        });
    }

    let identities = verify_outputs(identifier, &output.files, &request.to).await?;
    Ok((output, identities))
}

/// Re-identifies every output and checks it against the hop format.
pub async fn verify_outputs(
    identifier: &dyn Identifier,
    files: &[PathBuf],
    expected: &FormatCode,
) -> Result<Vec<FileIdentity>, ConverterError> {
    let mut identities = Vec::with_capacity(files.len());
    for file in files {
        let identity = identifier.identify(file).await.map_err(|e| {
            ConverterError::IdentificationFailed {
                path: file.clone(),
                reason: e.to_string(),
            }
        })?;

        if identity.format != *expected {
            return Err(ConverterError::VerificationFailed {
                path: file.clone(),
                expected: expected.clone(),
                actual: identity.format,
            });
        }
        identities.push(identity);
    }
    Ok(identities)
}

/// Moves the verified outputs and attachments into the tree.
///
/// The hop input is replaced or deleted only after everything else is in
/// place. On error every file moved so far is removed again and the input is
/// left as it was.
async fn place_outputs(
    request: &HopRequest,
    output: HopOutput,
    identities: Vec<FileIdentity>,
) -> Result<(Vec<PlacedFile>, Vec<PathBuf>), ConverterError> {
    let mut placement = Placement::default();
    match place_all(request, output, identities, &mut placement).await {
        Ok(placed) => Ok(placed),
        Err(e) => {
            placement.rollback().await;
            Err(e)
        }
    }
}

/// Files and directories created while placing one hop's outputs.
#[derive(Default)]
struct Placement {
    moved: Vec<PathBuf>,
    created_dir: Option<PathBuf>,
}

impl Placement {
    async fn rollback(self) {
        for path in self.moved.iter().rev() {
            if let Err(e) = fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove placed output");
            }
        }
        if let Some(dir) = self.created_dir {
            // Only succeeds when empty.
            let _ = fs::remove_dir(&dir).await;
        }
    }
}

async fn place_all(
    request: &HopRequest,
    output: HopOutput,
    identities: Vec<FileIdentity>,
    placement: &mut Placement,
) -> Result<(Vec<PlacedFile>, Vec<PathBuf>), ConverterError> {
    let dest_dir = request
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut attachments = Vec::with_capacity(output.attachments.len());
    if !output.attachments.is_empty() {
        let stem = request
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| request.file_id.to_string());
        let attachment_dir = dest_dir.join(format!("{}_attachments", stem));
        if !attachment_dir.is_dir() {
            fs::create_dir_all(&attachment_dir).await?;
            placement.created_dir = Some(attachment_dir.clone());
        }

        for file in output.attachments {
            let destination = unique_destination(&attachment_dir, &file_name(&file), None);
            move_file(&file, &destination).await?;
            placement.moved.push(destination.clone());
            attachments.push(destination);
        }
    }

    let mut placed = Vec::with_capacity(output.files.len());
    let mut replacing_input = None;
    for (file, mut identity) in output.files.into_iter().zip(identities) {
        let destination = unique_destination(&dest_dir, &file_name(&file), Some(&request.input));
        if destination == request.input {
            replacing_input = Some(file);
        } else {
            move_file(&file, &destination).await?;
            placement.moved.push(destination.clone());
        }
        identity.path = destination.clone();
        placed.push(PlacedFile {
            path: destination,
            identity,
        });
    }

    match replacing_input {
        Some(file) => move_file(&file, &request.input).await?,
        None => fs::remove_file(&request.input).await?,
    }

    Ok((placed, attachments))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

async fn remove_dir_quietly(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir).await {
            debug!(dir = %dir.display(), error = %e, "Failed to clean scratch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FileRecord;
    use crate::testing::{MockConverter, MockIdentifier};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        out: PathBuf,
        settings: DispatchSettings,
        identifier: MockIdentifier,
        registry: FileRegistry,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).await.unwrap();
        let settings = DispatchSettings {
            retry: RetryConfig::immediate(3),
            hop_timeout: Duration::from_secs(5),
            temp_dir: dir.path().join("tmp"),
        };
        Fixture {
            _dir: dir,
            out,
            settings,
            identifier: MockIdentifier::new(),
            registry: FileRegistry::new(),
        }
    }

    async fn add_file(f: &Fixture, name: &str, format: &str, route: &[&str]) -> HopRequest {
        let path = f.out.join(name);
        MockIdentifier::write_tagged(&path, format).await.unwrap();
        let identity = f.identifier.identify(&path).await.unwrap();
        let mut record = FileRecord::from_identity(&path, &identity);
        record.target_format = route.last().map(|t| FormatCode::from(*t));
        record.route = route.iter().map(|c| FormatCode::from(*c)).collect::<VecDeque<_>>();
        let id = f.registry.insert(record).await;
        HopRequest {
            file_id: id,
            input: path,
            from: format.into(),
            to: route[0].into(),
        }
    }

    fn registered(converter: MockConverter) -> (Arc<MockConverter>, RegisteredConverter) {
        let converter = Arc::new(converter);
        let registered = RegisteredConverter::new(converter.clone());
        (converter, registered)
    }

    #[tokio::test]
    async fn test_success_repoints_and_deletes_input() {
        let f = fixture().await;
        let request = add_file(&f, "letter.doc", "fmt/40", &["fmt/412", "fmt/477"]).await;
        let (_, converter) = registered(MockConverter::new("office").with_conversion("fmt/40", "fmt/412"));

        let success = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap();

        assert_eq!(success.attempts, 1);
        assert!(!success.is_split());
        assert!(!request.input.exists());

        let record = f.registry.get(&request.file_id).await.unwrap();
        assert_eq!(record.path, success.outputs[0].path);
        assert!(record.path.exists());
        assert_eq!(record.current_format.as_str(), "fmt/412");
        assert_eq!(record.route.len(), 1);
        assert_eq!(record.converted_by, vec!["office"]);
        assert!(!record.flags.failed);
        assert!(!f.settings.temp_dir.join(request.file_id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_same_name_output_replaces_input() {
        let f = fixture().await;
        let request = add_file(&f, "scan.pdf", "fmt/276", &["fmt/477"]).await;
        let (_, converter) = registered(
            MockConverter::new("pdfa")
                .with_conversion("fmt/276", "fmt/477")
                .with_extension("pdf"),
        );

        let success = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap();
        assert_eq!(success.outputs[0].path, request.input);
        assert_eq!(
            f.identifier.identify(&request.input).await.unwrap().format.as_str(),
            "fmt/477"
        );
    }

    #[tokio::test]
    async fn test_verification_failure_is_retried_then_failed() {
        let f = fixture().await;
        let request = add_file(&f, "letter.doc", "fmt/40", &["fmt/477"]).await;
        let (mock, converter) = registered(
            MockConverter::new("liar")
                .with_conversion("fmt/40", "fmt/477")
                .with_wrong_output("fmt/276"),
        );

        let failure = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, ConverterError::VerificationFailed { .. }));
        assert_eq!(mock.conversion_count().await, 3);
        assert!(request.input.exists());

        let record = f.registry.get(&request.file_id).await.unwrap();
        assert!(record.flags.failed);
        assert_eq!(record.path, request.input);
        assert_eq!(record.current_format.as_str(), "fmt/40");
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let f = fixture().await;
        let settings = f.settings.clone().with_hop_timeout(Duration::from_millis(20));
        let request = add_file(&f, "slow.doc", "fmt/40", &["fmt/412"]).await;
        let (mock, converter) = registered(
            MockConverter::new("slow")
                .with_conversion("fmt/40", "fmt/412")
                .with_delay(Duration::from_millis(500)),
        );

        let failure = convert_file(&converter, &f.identifier, &f.registry, &settings, &request)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, ConverterError::Timeout { .. }));
        assert_eq!(mock.conversion_count().await, 3);
        assert!(f.registry.get(&request.file_id).await.unwrap().flags.failed);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let f = fixture().await;
        let request = add_file(&f, "flaky.doc", "fmt/40", &["fmt/412"]).await;
        let (mock, converter) =
            registered(MockConverter::new("flaky").with_conversion("fmt/40", "fmt/412"));
        mock.fail_next(2).await;

        let success = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap();
        assert_eq!(success.attempts, 3);
    }

    #[tokio::test]
    async fn test_split_output_flags_parent() {
        let f = fixture().await;
        let request = add_file(&f, "report.pdf", "fmt/276", &["fmt/13"]).await;
        let (_, converter) = registered(
            MockConverter::new("pages")
                .with_conversion("fmt/276", "fmt/13")
                .with_split(3),
        );

        let success = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap();

        assert!(success.is_split());
        assert_eq!(success.outputs.len(), 3);
        for output in &success.outputs {
            assert!(output.path.exists());
            assert_eq!(output.identity.format.as_str(), "fmt/13");
        }
        let record = f.registry.get(&request.file_id).await.unwrap();
        assert!(record.flags.is_part_of_split);
        assert_eq!(record.path, success.outputs[0].path);
    }

    #[tokio::test]
    async fn test_attachments_are_placed_beside_output() {
        let f = fixture().await;
        let request = add_file(&f, "mail.eml", "fmt/950", &["fmt/276"]).await;
        let (_, converter) = registered(
            MockConverter::new("mail")
                .with_conversion("fmt/950", "fmt/276")
                .with_attachment("invoice.doc", "fmt/40"),
        );

        let success = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap();

        assert_eq!(success.attachments.len(), 1);
        assert_eq!(
            success.attachments[0],
            f.out.join("mail_attachments").join("invoice.doc")
        );
        assert!(success.attachments[0].exists());
    }

    #[tokio::test]
    async fn test_placement_error_leaves_input_and_tree_untouched() {
        let f = fixture().await;
        let request = add_file(&f, "mail.eml", "fmt/950", &["fmt/276"]).await;
        // A plain file where the attachment directory has to go.
        fs::write(f.out.join("mail_attachments"), b"in the way").await.unwrap();
        let (_, converter) = registered(
            MockConverter::new("mail")
                .with_conversion("fmt/950", "fmt/276")
                .with_attachment("invoice.doc", "fmt/40"),
        );

        let failure = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, ConverterError::Io(_)));

        assert!(request.input.exists());
        assert_eq!(
            f.identifier.identify(&request.input).await.unwrap().format.as_str(),
            "fmt/950"
        );
        let record = f.registry.get(&request.file_id).await.unwrap();
        assert!(record.flags.failed);
        assert_eq!(record.path, request.input);
        assert_eq!(record.current_format.as_str(), "fmt/950");

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&f.out).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        assert_eq!(names, vec!["mail.eml", "mail_attachments"]);
    }

    #[tokio::test]
    async fn test_missing_input_not_retried() {
        let f = fixture().await;
        let request = add_file(&f, "gone.doc", "fmt/40", &["fmt/412"]).await;
        fs::remove_file(&request.input).await.unwrap();
        let (mock, converter) =
            registered(MockConverter::new("office").with_conversion("fmt/40", "fmt/412"));

        let failure = convert_file(&converter, &f.identifier, &f.registry, &f.settings, &request)
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(matches!(failure.error, ConverterError::InputNotFound { .. }));
        assert_eq!(mock.conversion_count().await, 0);
    }
}
