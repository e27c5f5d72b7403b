use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{LogEntry, LogRecord, Severity};

#[derive(Debug, Default)]
struct Counters {
    warnings: AtomicU64,
    errors: AtomicU64,
}

/// Handle for writing to the run log
///
/// This is cheaply cloneable and can be shared across tasks.
/// Entries are sent through an async channel to be written by the RunLogWriter.
/// Warnings and errors are counted as they are emitted, so the counts are
/// exact even before the writer has caught up.
#[derive(Clone)]
pub struct RunLogHandle {
    tx: mpsc::Sender<LogRecord>,
    counters: Arc<Counters>,
}

impl RunLogHandle {
    /// Create a new handle from a channel sender
    pub fn new(tx: mpsc::Sender<LogRecord>) -> Self {
        Self {
            tx,
            counters: Arc::new(Counters::default()),
        }
    }

    fn count(&self, severity: Severity) {
        match severity {
            Severity::Warning => self.counters.warnings.fetch_add(1, Ordering::Relaxed),
            Severity::Error => self.counters.errors.fetch_add(1, Ordering::Relaxed),
            Severity::Info => 0,
        };
    }

    /// Emit an entry asynchronously
    ///
    /// If the channel is closed, the error is logged but the caller is not failed.
    pub async fn emit(&self, entry: LogEntry) {
        self.count(entry.severity);
        let record = LogRecord {
            timestamp: Utc::now(),
            entry,
        };
        if let Err(e) = self.tx.send(record).await {
            tracing::error!("Failed to write run log entry: {}", e);
        }
    }

    /// Try to emit an entry without blocking
    ///
    /// Returns true if the entry was sent successfully, false otherwise.
    /// The entry is counted either way.
    pub fn try_emit(&self, entry: LogEntry) -> bool {
        self.count(entry.severity);
        let record = LogRecord {
            timestamp: Utc::now(),
            entry,
        };
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to write run log entry: {}", e);
                false
            }
        }
    }

    pub fn warning_count(&self) -> u64 {
        self.counters.warnings.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    /// Whether anything at warning level or above was logged.
    pub fn has_problems(&self) -> bool {
        self.warning_count() > 0 || self.error_count() > 0
    }
}
