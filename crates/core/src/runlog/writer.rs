use std::sync::Arc;

use tokio::sync::mpsc;

use super::{LogRecord, RunLogHandle, RunLogStore};

/// Background task that receives run log entries and writes them to storage
pub struct RunLogWriter {
    rx: mpsc::Receiver<LogRecord>,
    store: Arc<dyn RunLogStore>,
}

impl RunLogWriter {
    /// Create a new run log writer
    pub fn new(rx: mpsc::Receiver<LogRecord>, store: Arc<dyn RunLogStore>) -> Self {
        Self { rx, store }
    }

    /// Run the writer, consuming entries until every handle is dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::debug!("Run log writer started");

        while let Some(record) = self.rx.recv().await {
            if let Err(e) = self.store.append(&record) {
                tracing::error!("Failed to write run log entry: {}", e);
            }
        }

        tracing::debug!("Run log writer shutting down");
    }
}

/// Create a complete run log
///
/// Returns:
/// - `RunLogHandle` - for emitting entries (clone this to share across tasks)
/// - `RunLogWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_run_log(
    store: Arc<dyn RunLogStore>,
    buffer_size: usize,
) -> (RunLogHandle, RunLogWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = RunLogHandle::new(tx);
    let writer = RunLogWriter::new(rx, store);
    (handle, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::{LogEntry, MemoryStore, RunLogError};

    struct FailingStore;

    impl RunLogStore for FailingStore {
        fn append(&self, _record: &LogRecord) -> Result<(), RunLogError> {
            Err(RunLogError::Serialization("Mock failure".to_string()))
        }

        fn read_all(&self) -> Result<Vec<LogRecord>, RunLogError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_writer_stores_entries_until_handles_dropped() {
        let store = Arc::new(MemoryStore::new());
        let (handle, writer) = create_run_log(store.clone(), 10);
        let writer_handle = tokio::spawn(writer.run());

        for i in 0..5 {
            handle.emit(LogEntry::info(format!("entry {}", i))).await;
        }
        drop(handle);
        writer_handle.await.unwrap();

        let records = store.read_all().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].entry.message, "entry 4");
    }

    #[tokio::test]
    async fn test_writer_continues_on_append_failure() {
        let (handle, writer) = create_run_log(Arc::new(FailingStore), 10);
        let writer_handle = tokio::spawn(writer.run());

        handle.emit(LogEntry::error("first")).await;
        handle.emit(LogEntry::error("second")).await;
        drop(handle);

        // Writer should complete normally
        writer_handle.await.unwrap();
    }
}
