//! Conversion run implementation.
//!
//! Wires the run context from configuration, then drives the phases listed in
//! the module docs. Per-file problems never abort a run: they are flagged on
//! the record and written to the run log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{validate_config, Config};
use crate::consistency::ConsistencyChecker;
use crate::context::RunContext;
use crate::converter::{ConverterRegistry, DispatchSettings};
use crate::discovery::prepare_workspace;
use crate::identifier::{identify_all, FileIdentity, Identifier, IdentifierConfig, SiegfriedIdentifier};
use crate::merge::MergePipeline;
use crate::metrics::FILES_IDENTIFIED;
use crate::registry::{FileRecord, FileRegistry, TargetResolver};
use crate::report::{write_documentation, DocumentationBuilder, RunSummary};
use crate::routing::{assign_routes, build_routes, route_keys, RouteTable};
use crate::runlog::{create_run_log, JsonLinesStore, LogEntry, RunLogHandle, RunLogStore};
use crate::scheduler::{ConversionScheduler, ProgressReporter, SchedulerConfig};

use super::types::{RunError, RunOutcome, RunPhase};

/// One conversion run over an input folder.
///
/// Collaborators not supplied through the `with_*` methods are built from the
/// configuration: the built-in converters, Siegfried, and a JSON-lines run log
/// at `run.log_path`.
pub struct ConversionRun {
    config: Config,
    converters: Option<ConverterRegistry>,
    identifier: Option<Arc<dyn Identifier>>,
    run_log_store: Option<Arc<dyn RunLogStore>>,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl ConversionRun {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            converters: None,
            identifier: None,
            run_log_store: None,
            progress: None,
        }
    }

    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Some(converters);
        self
    }

    pub fn with_identifier(mut self, identifier: Arc<dyn Identifier>) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_run_log_store(mut self, store: Arc<dyn RunLogStore>) -> Self {
        self.run_log_store = Some(store);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs every phase and writes the documentation.
    ///
    /// Returns an error only when the run cannot start: invalid
    /// configuration, no usable converter or identifier, or no identifiable
    /// input.
    pub async fn execute(self) -> Result<RunOutcome, RunError> {
        let ConversionRun {
            config,
            converters,
            identifier,
            run_log_store,
            progress,
        } = self;

        validate_config(&config)?;

        let scratch = config
            .run
            .temp_dir
            .join(format!("run-{}", Uuid::new_v4()));
        let converters = match converters {
            Some(converters) => converters,
            None => {
                ConverterRegistry::from_config(
                    &config.converters,
                    config.run.worker_threads(),
                    &scratch,
                )
                .await
            }
        };
        if converters.is_empty() {
            return Err(RunError::NoConverters);
        }
        info!(converters = ?converters.names(), "Converters registered");

        let identifier = identifier.unwrap_or_else(|| {
            Arc::new(SiegfriedIdentifier::new(
                config.identifier.clone(),
                config.run.checksum,
            ))
        });
        identifier.validate().await?;

        let store: Arc<dyn RunLogStore> = match run_log_store {
            Some(store) => store,
            None => Arc::new(JsonLinesStore::open(&config.run.log_path)?),
        };
        let progress =
            progress.unwrap_or_else(|| Arc::from(config.orchestrator.progress.reporter()));

        let (run_log, writer) = create_run_log(store, config.orchestrator.run_log_buffer);
        let writer_task = tokio::spawn(writer.run());

        let result = run_phases(&config, converters, identifier, run_log, progress, &scratch).await;

        if config.orchestrator.clean_temp_dir {
            if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %scratch.display(), error = %e, "Failed to remove scratch directory");
                }
            }
        }

        // Every handle is gone once the phases return, so the writer drains
        // and stops.
        if let Err(e) = writer_task.await {
            warn!(error = %e, "Run log writer task failed");
        }

        if let Ok(ref outcome) = result {
            info!(
                converted = outcome.summary.converted,
                failed = outcome.summary.failed,
                not_supported = outcome.summary.not_supported,
                errors = outcome.summary.errors,
                warnings = outcome.summary.warnings,
                documentation = %outcome.documentation_path.display(),
                "Run finished"
            );
        }
        result
    }
}

async fn run_phases(
    config: &Config,
    converters: ConverterRegistry,
    identifier: Arc<dyn Identifier>,
    run_log: RunLogHandle,
    progress: Arc<dyn ProgressReporter>,
    scratch: &Path,
) -> Result<RunOutcome, RunError> {
    let run = &config.run;

    enter(RunPhase::Preparing);
    let paths = prepare_workspace(&run.input_folder, &run.output_folder).await?;
    if paths.is_empty() {
        return Err(RunError::NoInput(run.input_folder.clone()));
    }
    let output_root = tokio::fs::canonicalize(&run.output_folder).await?;

    enter(RunPhase::Identifying);
    let files = FileRegistry::new();
    let identified = identify_inputs(
        identifier.as_ref(),
        &paths,
        &config.identifier,
        &files,
        &run_log,
    )
    .await;
    if identified == 0 {
        return Err(RunError::NoIdentifiableInput(run.input_folder.clone()));
    }

    let mut dispatch = DispatchSettings::from_run_config(run);
    dispatch.temp_dir = scratch.to_path_buf();
    let context = RunContext {
        converters,
        routes: Arc::new(RouteTable::new()),
        files,
        identifier,
        targets: Arc::new(TargetResolver::new(
            config.formats.clone(),
            config.folders.clone(),
        )),
        run_log,
        dispatch,
        output_root,
    };

    enter(RunPhase::ResolvingTargets);
    resolve_targets(&context).await;

    enter(RunPhase::Merging);
    let merge = MergePipeline::new(context.clone(), run.max_merge_size_bytes())
        .run()
        .await;

    enter(RunPhase::Routing);
    let mut keys = route_keys(&context.files).await;
    for pair in context.targets.declared_pairs() {
        if !keys.contains(&pair) {
            keys.push(pair);
        }
    }
    let table = build_routes(keys, &context.converters, run.max_route_hops);
    info!(routes = table.len(), "Route table built");
    let context = RunContext {
        routes: Arc::new(table),
        ..context
    };
    let routed = assign_routes(&context.files, &context.routes).await;
    debug!(files = routed, "Routes assigned");

    enter(RunPhase::Scheduling);
    let scheduler_config = SchedulerConfig::from_run_config(run)
        .with_max_generations(config.orchestrator.max_generations);
    let scheduler =
        ConversionScheduler::new(scheduler_config, context.clone())?.with_progress(progress);
    scheduler.enqueue_registered().await;
    let schedule = scheduler.run().await;

    enter(RunPhase::Checking);
    let consistency = ConsistencyChecker::new(context.identifier.clone(), config.identifier.clone())
        .with_run_log(context.run_log.clone())
        .finalize(&context.files)
        .await;

    enter(RunPhase::Documenting);
    let counters = RunSummary {
        generations: schedule.generations,
        hops_succeeded: schedule.hops_succeeded,
        hops_failed: schedule.hops_failed,
        warnings: context.run_log.warning_count(),
        errors: context.run_log.error_count(),
        ..Default::default()
    };
    let documentation = DocumentationBuilder::new(&run.input_folder, &context.output_root)
        .with_summary(counters)
        .build(&context.files.records().await);
    write_documentation(&documentation, &run.documentation_path).await?;

    Ok(RunOutcome {
        summary: documentation.summary,
        schedule,
        merge,
        consistency,
        documentation_path: run.documentation_path.clone(),
        log_path: run.log_path.clone(),
    })
}

fn enter(phase: RunPhase) {
    info!(phase = %phase, "Run phase started");
}

/// Registers one record per copied file. Files of unknown format are flagged
/// unsupported. Returns how many files were identified.
async fn identify_inputs(
    identifier: &dyn Identifier,
    paths: &[PathBuf],
    config: &IdentifierConfig,
    files: &FileRegistry,
    run_log: &RunLogHandle,
) -> usize {
    let mut identities = identify_all(identifier, paths, config).await;
    let mut identified = 0;

    for path in paths {
        let identity = identities
            .remove(path)
            .unwrap_or_else(|| FileIdentity::unidentified(path, "not identified"));
        let mut record = FileRecord::from_identity(path, &identity);

        if identity.is_identified() {
            identified += 1;
            FILES_IDENTIFIED.with_label_values(&["identified"]).inc();
        } else {
            FILES_IDENTIFIED.with_label_values(&["unknown"]).inc();
            record.flags.not_supported = true;
            warn!(path = %path.display(), "Format could not be identified");
            let mut message = "Format could not be identified".to_string();
            if let Some(reason) = identity.errors.first() {
                message = format!("{}: {}", message, reason);
            }
            run_log
                .emit(
                    LogEntry::warning(message)
                        .with_mime(identity.mime.clone())
                        .with_file(path),
                )
                .await;
        }
        files.insert(record).await;
    }

    info!(files = paths.len(), identified, "Identification finished");
    identified
}

/// Decides the target of every identified record. Folder overrides that
/// request merging divert their files to the merge pipeline.
async fn resolve_targets(context: &RunContext) {
    let mut with_target = 0;
    let mut merged = 0;
    let mut unset = 0;

    for record in context.files.records().await {
        if record.flags.not_supported {
            continue;
        }
        let decision = context
            .targets
            .resolve(context.relative(&record.path), &record.current_format);

        let merge = decision.merge;
        let no_target = !merge && decision.target.is_none();
        context
            .files
            .update(&record.id, |r| {
                r.target_format = decision.target;
                r.flags.should_merge = merge;
                r.flags.output_not_set = no_target;
            })
            .await;

        if merge {
            merged += 1;
        } else if no_target {
            unset += 1;
            debug!(path = %record.path.display(), format = %record.current_format, "No target format");
            context
                .run_log
                .emit(
                    LogEntry::info("No target format configured")
                        .with_pronom(&record.current_format)
                        .with_mime(record.original_mime.clone())
                        .with_file(&record.path),
                )
                .await;
        } else {
            with_target += 1;
        }
    }

    info!(
        targets = with_target,
        merge = merged,
        output_not_set = unset,
        "Targets resolved"
    );
}
