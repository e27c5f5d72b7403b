//! Conversion scheduler implementation.
//!
//! Each generation dispatches the next hop of every file in the working set,
//! waits for all of them, then updates the working set:
//! - untouched files are dropped as unsupported (fresh files get one pass),
//! - successful files advance and leave once their route is exhausted,
//! - failed files leave for good.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::RunContext;
use crate::converter::{
    convert_file, ConverterError, HopFailure, HopRequest, HopSuccess, RegisteredConverter,
};
use crate::identifier::FileIdentity;
use crate::metrics::{FILES_UNSUPPORTED, GENERATIONS_TOTAL, WORKING_SET_SIZE};
use crate::registry::FileRecord;
use crate::runlog::LogEntry;

use super::config::SchedulerConfig;
use super::progress::{NoProgress, ProgressEvent, ProgressReporter, ProgressTracker};
use super::types::{HopState, ScheduleSummary, SchedulerError};
use super::working_set::{WorkItem, WorkingSet};

/// A finished dispatch task.
struct Dispatched {
    request: HopRequest,
    converter: String,
    result: Result<Result<HopSuccess, HopFailure>, JoinError>,
}

/// Per-generation counters for the progress report.
#[derive(Default)]
struct GenerationTally {
    succeeded: usize,
    failed: usize,
    unsupported: usize,
}

/// Drives the working set until it drains.
pub struct ConversionScheduler {
    config: SchedulerConfig,
    context: RunContext,
    working_set: WorkingSet,
    permits: Arc<Semaphore>,
    progress: Arc<dyn ProgressReporter>,
}

impl ConversionScheduler {
    /// Create a new scheduler.
    pub fn new(config: SchedulerConfig, context: RunContext) -> Result<Self, SchedulerError> {
        if config.max_concurrent == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent cannot be 0".to_string(),
            ));
        }
        if context.converters.is_empty() {
            return Err(SchedulerError::NoConverters);
        }

        let permits = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            config,
            context,
            working_set: WorkingSet::new(),
            permits,
            progress: Arc::new(NoProgress),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Seeds the working set with every registry file that still needs a
    /// conversion. Files already in their target format, merge-diverted,
    /// failed or unsupported files stay out.
    pub async fn enqueue_registered(&self) -> usize {
        let mut queued = 0;
        for record in self.context.files.records().await {
            if !record.is_live()
                || record.flags.should_merge
                || record.flags.failed
                || record.flags.not_supported
                || !record.needs_conversion()
            {
                continue;
            }
            self.working_set.insert(WorkItem::from_record(&record)).await;
            queued += 1;
        }
        WORKING_SET_SIZE.set(queued as i64);
        info!(files = queued, "Working set seeded");
        queued
    }

    /// Runs generations until the working set is empty.
    pub async fn run(&self) -> ScheduleSummary {
        let mut summary = ScheduleSummary::default();

        loop {
            let items = self.working_set.snapshot().await;
            WORKING_SET_SIZE.set(items.len() as i64);
            if items.is_empty() {
                break;
            }

            if summary.generations >= self.config.max_generations {
                self.abandon(&mut summary).await;
                break;
            }

            summary.generations += 1;
            GENERATIONS_TOTAL.inc();
            self.run_generation(summary.generations, items, &mut summary)
                .await;
        }

        WORKING_SET_SIZE.set(0);
        info!(
            generations = summary.generations,
            hops_succeeded = summary.hops_succeeded,
            hops_failed = summary.hops_failed,
            unsupported = summary.files_unsupported,
            derived = summary.files_derived,
            "Scheduling finished"
        );
        summary
    }

    async fn run_generation(
        &self,
        generation: u32,
        items: Vec<WorkItem>,
        summary: &mut ScheduleSummary,
    ) {
        let mut states: HashMap<Uuid, HopState> = items
            .iter()
            .map(|item| (item.file_id, HopState::PendingDispatch))
            .collect();

        let mut dispatches = FuturesUnordered::new();
        for item in &items {
            let Some(next) = item.next_hop() else {
                continue;
            };
            // First registered converter wins.
            let Some(converter) = self.context.converters.find(&item.current_format, next) else {
                debug!(
                    file_id = %item.file_id,
                    from = %item.current_format,
                    to = %next,
                    "No converter for hop"
                );
                continue;
            };

            states.insert(item.file_id, HopState::Dispatched);
            dispatches.push(self.dispatch(
                converter,
                HopRequest {
                    file_id: item.file_id,
                    input: item.path.clone(),
                    from: item.current_format.clone(),
                    to: next.clone(),
                },
            ));
        }

        self.progress.report(ProgressEvent::GenerationStarted {
            generation,
            files: items.len(),
            dispatched: dispatches.len(),
        });
        debug!(generation, files = items.len(), dispatched = dispatches.len(), "Generation started");

        // Completion barrier: every dispatch of the generation is accounted for.
        let mut tracker = ProgressTracker::new(dispatches.len());
        let mut finished = Vec::with_capacity(dispatches.len());
        while let Some(dispatched) = dispatches.next().await {
            tracker.tick();
            self.progress.report(ProgressEvent::HopFinished {
                generation,
                done: tracker.done(),
                total: tracker.total(),
                elapsed: tracker.elapsed(),
                remaining: tracker.remaining(),
            });
            finished.push(dispatched);
        }

        let mut tally = GenerationTally::default();
        for dispatched in finished {
            let id = dispatched.request.file_id;
            let state = match dispatched.result {
                Ok(Ok(success)) => {
                    tally.succeeded += 1;
                    self.complete_hop(&dispatched.request, success, summary).await
                }
                Ok(Err(failure)) => {
                    tally.failed += 1;
                    self.fail_hop(&dispatched.request, failure, summary).await
                }
                Err(join_error) => {
                    tally.failed += 1;
                    let failure = HopFailure {
                        converter: dispatched.converter,
                        attempts: 0,
                        error: ConverterError::Aborted {
                            reason: format!("dispatch task ended abnormally: {}", join_error),
                        },
                    };
                    self.context
                        .files
                        .update(&id, |record| record.flags.failed = true)
                        .await;
                    self.fail_hop(&dispatched.request, failure, summary).await
                }
            };
            states.insert(id, state);
        }

        for item in &items {
            if states.get(&item.file_id) != Some(&HopState::PendingDispatch) {
                continue;
            }
            if item.fresh {
                self.working_set
                    .update(&item.file_id, |item| item.fresh = false)
                    .await;
                continue;
            }
            self.mark_unsupported(item).await;
            tally.unsupported += 1;
            summary.files_unsupported += 1;
        }

        let remaining_files = self.working_set.len().await;
        self.progress.report(ProgressEvent::GenerationFinished {
            generation,
            succeeded: tally.succeeded,
            failed: tally.failed,
            unsupported: tally.unsupported,
            remaining_files,
        });
        info!(
            generation,
            succeeded = tally.succeeded,
            failed = tally.failed,
            unsupported = tally.unsupported,
            remaining = remaining_files,
            "Generation finished"
        );
    }

    /// Spawns one hop on the worker pool.
    fn dispatch(
        &self,
        converter: Arc<RegisteredConverter>,
        request: HopRequest,
    ) -> impl Future<Output = Dispatched> {
        let permits = self.permits.clone();
        let identifier = self.context.identifier.clone();
        let files = self.context.files.clone();
        let settings = self.context.dispatch.clone();
        let name = converter.name().to_string();
        let task_request = request.clone();

        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return Err(HopFailure {
                        converter: converter.name().to_string(),
                        attempts: 0,
                        error: ConverterError::Aborted {
                            reason: "worker pool closed".to_string(),
                        },
                    })
                }
            };
            convert_file(
                &converter,
                identifier.as_ref(),
                &files,
                &settings,
                &task_request,
            )
            .await
        });

        async move {
            Dispatched {
                request,
                converter: name,
                result: handle.await,
            }
        }
    }

    async fn complete_hop(
        &self,
        request: &HopRequest,
        success: HopSuccess,
        summary: &mut ScheduleSummary,
    ) -> HopState {
        summary.hops_succeeded += 1;
        let id = request.file_id;
        let new_path = success.outputs[0].path.clone();

        let done = self
            .working_set
            .update(&id, |item| item.advance(new_path, request.to.clone()))
            .await
            .unwrap_or(true);

        let state = if done {
            self.working_set.remove(&id).await;
            summary.files_completed += 1;
            HopState::Done
        } else {
            HopState::CompletedHop
        };

        if success.is_split() {
            self.register_split(id, &success, summary).await;
        }
        for attachment in success.attachments {
            self.register_attachment(id, attachment, summary).await;
        }

        state
    }

    async fn fail_hop(
        &self,
        request: &HopRequest,
        failure: HopFailure,
        summary: &mut ScheduleSummary,
    ) -> HopState {
        summary.hops_failed += 1;
        summary.files_failed += 1;
        self.working_set.remove(&request.file_id).await;

        let entry = LogEntry::error(format!(
            "Conversion from {} to {} failed after {} attempt(s): {}",
            request.from, request.to, failure.attempts, failure.error
        ))
        .with_pronom(&request.from)
        .with_file(&request.input)
        .with_converter(failure.converter);
        self.log_for(&request.file_id, entry).await;

        HopState::Failed
    }

    async fn mark_unsupported(&self, item: &WorkItem) {
        self.working_set.remove(&item.file_id).await;
        self.context
            .files
            .update(&item.file_id, |record| record.flags.not_supported = true)
            .await;
        FILES_UNSUPPORTED.inc();

        let message = match item.next_hop() {
            Some(next) => format!(
                "No converter supports {} to {}",
                item.current_format, next
            ),
            None => format!("No conversion route from {}", item.current_format),
        };
        warn!(file_id = %item.file_id, path = %item.path.display(), "{}", message);
        let entry = LogEntry::warning(message)
            .with_pronom(&item.current_format)
            .with_file(&item.path);
        self.log_for(&item.file_id, entry).await;
    }

    /// Registers the extra pages of a split. They continue along the
    /// parent's remaining route.
    async fn register_split(&self, parent_id: Uuid, success: &HopSuccess, summary: &mut ScheduleSummary) {
        let Some(parent) = self.context.files.get(&parent_id).await else {
            return;
        };

        for placed in success.outputs.iter().skip(1) {
            let mut record = FileRecord::derived(&placed.path, &placed.identity, parent_id);
            record.flags.is_part_of_split = true;
            record.flags.modified = true;
            record.target_format = parent.target_format.clone();
            record.route = parent.route.clone();
            record.converted_by = parent.converted_by.clone();

            if !record.route.is_empty() {
                self.working_set
                    .insert(WorkItem::from_record(&record).fresh())
                    .await;
            }
            debug!(parent = %parent_id, path = %placed.path.display(), "Split page registered");
            self.context.files.insert(record).await;
            summary.files_derived += 1;
        }
    }

    /// Identifies an extracted attachment, resolves its target and queues it
    /// when it needs converting.
    async fn register_attachment(
        &self,
        parent_id: Uuid,
        path: PathBuf,
        summary: &mut ScheduleSummary,
    ) {
        let identity = match self.context.identifier.identify(&path).await {
            Ok(identity) => identity,
            Err(e) => FileIdentity::unidentified(&path, e.to_string()),
        };
        let mut record = FileRecord::derived(&path, &identity, parent_id);
        summary.files_derived += 1;

        if !identity.is_identified() {
            record.flags.not_supported = true;
            let entry = LogEntry::warning(format!(
                "Attachment could not be identified: {}",
                identity.errors.join("; ")
            ))
            .with_file(&path);
            self.context.run_log.emit(entry).await;
            self.context.files.insert(record).await;
            return;
        }

        let decision = self
            .context
            .targets
            .resolve(self.context.relative(&path), &record.current_format);
        record.target_format = decision.target.clone();

        match decision.target {
            None => {
                record.flags.output_not_set = true;
                let entry = LogEntry::warning("No target format configured for attachment")
                    .with_pronom(&record.current_format)
                    .with_mime(record.original_mime.clone())
                    .with_file(&path);
                self.context.run_log.emit(entry).await;
            }
            Some(ref target) if *target == record.current_format => {}
            Some(ref target) => match self.context.routes.get(&record.current_format, target) {
                Some(hops) => {
                    record.route = hops.iter().cloned().collect();
                    self.working_set
                        .insert(WorkItem::from_record(&record).fresh())
                        .await;
                }
                None => {
                    record.flags.not_supported = true;
                    FILES_UNSUPPORTED.inc();
                    summary.files_unsupported += 1;
                    let message =
                        format!("No conversion route from {} to {}", record.current_format, target);
                    warn!(parent = %parent_id, path = %path.display(), "{}", message);
                    let entry = LogEntry::warning(message)
                        .with_pronom(&record.current_format)
                        .with_mime(record.original_mime.clone())
                        .with_file(&path);
                    self.context.run_log.emit(entry).await;
                }
            },
        }

        info!(
            parent = %parent_id,
            path = %path.display(),
            format = %record.current_format,
            queued = !record.route.is_empty(),
            "Attachment registered"
        );
        self.context.files.insert(record).await;
    }

    /// Generation limit reached: everything still queued is failed.
    async fn abandon(&self, summary: &mut ScheduleSummary) {
        let left = self.working_set.drain().await;
        error!(
            limit = self.config.max_generations,
            files = left.len(),
            "Generation limit reached, abandoning remaining files"
        );
        for item in left {
            self.context
                .files
                .update(&item.file_id, |record| record.flags.failed = true)
                .await;
            let entry = LogEntry::error(format!(
                "Abandoned after {} generations",
                self.config.max_generations
            ))
            .with_pronom(&item.current_format)
            .with_file(&item.path);
            self.log_for(&item.file_id, entry).await;
            summary.files_abandoned += 1;
        }
    }

    /// Emits `entry` with the record's MIME type attached.
    async fn log_for(&self, id: &Uuid, entry: LogEntry) {
        let entry = match self.context.files.get(id).await {
            Some(record) => entry.with_mime(record.original_mime),
            None => entry,
        };
        self.context.run_log.emit(entry).await;
    }
}
