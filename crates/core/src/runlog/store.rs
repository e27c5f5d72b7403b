use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use super::LogRecord;

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Trait for run log storage
pub trait RunLogStore: Send + Sync {
    /// Append one record
    fn append(&self, record: &LogRecord) -> Result<(), RunLogError>;

    /// All records in append order
    fn read_all(&self) -> Result<Vec<LogRecord>, RunLogError>;
}

/// Append-only JSON lines file
pub struct JsonLinesStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesStore {
    /// Opens (or creates) the log file for appending, creating parent
    /// directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RunLogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLogStore for JsonLinesStore {
    fn append(&self, record: &LogRecord) -> Result<(), RunLogError> {
        let mut line =
            serde_json::to_string(record).map_err(|e| RunLogError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().map_err(|_| RunLogError::Poisoned)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LogRecord>, RunLogError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(
                serde_json::from_str(&line)
                    .map_err(|e| RunLogError::Serialization(e.to_string()))?,
            );
        }
        Ok(records)
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunLogStore for MemoryStore {
    fn append(&self, record: &LogRecord) -> Result<(), RunLogError> {
        self.records
            .lock()
            .map_err(|_| RunLogError::Poisoned)?
            .push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LogRecord>, RunLogError> {
        Ok(self.records.lock().map_err(|_| RunLogError::Poisoned)?.clone())
    }
}
