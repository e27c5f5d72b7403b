//! Generation progress reporting.
//!
//! Progress goes to stderr so stdout stays parseable for scripts.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::{Duration, Instant};

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// A generation dispatched `dispatched` of the `files` in the working set.
    GenerationStarted {
        generation: u32,
        files: usize,
        dispatched: usize,
    },
    /// One dispatch of the generation finished.
    HopFinished {
        generation: u32,
        done: usize,
        total: usize,
        elapsed: Duration,
        remaining: Option<Duration>,
    },
    /// The completion barrier was reached and the working set updated.
    GenerationFinished {
        generation: u32,
        succeeded: usize,
        failed: usize,
        unsupported: usize,
        remaining_files: usize,
    },
}

/// Reports scheduler progress.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Tracks completion within one generation.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    total: usize,
    done: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            done: 0,
        }
    }

    /// Marks one more dispatch as finished.
    pub fn tick(&mut self) {
        self.done = (self.done + 1).min(self.total);
    }

    pub fn done(&self) -> usize {
        self.done
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Fraction complete in `[0, 1]`. An empty generation is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Remaining time extrapolated from the average so far.
    pub fn remaining(&self) -> Option<Duration> {
        estimate_remaining(self.elapsed(), self.done, self.total)
    }
}

fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    let per_item = elapsed.as_secs_f64() / done as f64;
    Some(Duration::from_secs_f64(
        per_item * total.saturating_sub(done) as f64,
    ))
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::GenerationStarted {
                generation,
                files,
                dispatched,
            } => format!(
                "generation {}  dispatching {} of {} files\n",
                generation, dispatched, files
            ),
            ProgressEvent::HopFinished {
                generation,
                done,
                total,
                elapsed,
                remaining,
            } => {
                let percent = if *total == 0 {
                    100.0
                } else {
                    *done as f64 * 100.0 / *total as f64
                };
                let eta = remaining
                    .map(format_duration)
                    .unwrap_or_else(|| "?".to_string());
                format!(
                    "generation {}  {} / {} ({:.0}%)  elapsed {}  remaining {}\n",
                    generation,
                    done,
                    total,
                    percent,
                    format_duration(*elapsed),
                    eta
                )
            }
            ProgressEvent::GenerationFinished {
                generation,
                succeeded,
                failed,
                unsupported,
                remaining_files,
            } => format!(
                "generation {}  done  {} succeeded, {} failed, {} unsupported, {} left\n",
                generation, succeeded, failed, unsupported, remaining_files
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::GenerationStarted {
                generation,
                files,
                dispatched,
            } => serde_json::json!({
                "event": "generation_started",
                "generation": generation,
                "files": files,
                "dispatched": dispatched,
            }),
            ProgressEvent::HopFinished {
                generation,
                done,
                total,
                elapsed,
                remaining,
            } => serde_json::json!({
                "event": "hop_finished",
                "generation": generation,
                "done": done,
                "total": total,
                "elapsed_secs": elapsed.as_secs_f64(),
                "remaining_secs": remaining.map(|r| r.as_secs_f64()),
            }),
            ProgressEvent::GenerationFinished {
                generation,
                succeeded,
                failed,
                unsupported,
                remaining_files,
            } => serde_json::json!({
                "event": "generation_finished",
                "generation": generation,
                "succeeded": succeeded,
                "failed": failed,
                "unsupported": unsupported,
                "remaining_files": remaining_files,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress mode: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    Off,
    #[default]
    Human,
    Json,
}

impl ProgressMode {
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h{:02}m{:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
