use std::path::Path;
use thiserror::Error;
use tokio::fs;

use super::types::Documentation;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Writes the documentation as pretty-printed JSON, creating parent
/// directories. The file is written next to its destination first and
/// renamed into place.
pub async fn write_documentation(doc: &Documentation, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let json = serde_json::to_vec_pretty(doc)?;
    let partial = path.with_extension("json.partial");
    fs::write(&partial, json).await?;
    fs::rename(&partial, path).await?;
    Ok(())
}

/// Reads documentation written by [`write_documentation`].
pub async fn read_documentation(path: &Path) -> Result<Documentation, ReportError> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
