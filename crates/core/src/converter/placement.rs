//! Moving verified outputs from scratch space into the output tree.

use std::path::{Path, PathBuf};
use tokio::fs;

/// Attempts to move a file atomically (rename).
async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(true),
        Err(e) => {
            // Cross-filesystem moves fail with EXDEV (18 on Linux)
            if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                Ok(false)
            } else {
                Err(e)
            }
        }
    }
}

/// Moves `source` to `destination`, copying across filesystems.
pub async fn move_file(source: &Path, destination: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }
    if !try_atomic_move(source, destination).await? {
        fs::copy(source, destination).await?;
        fs::remove_file(source).await?;
    }
    Ok(())
}

/// A free path for `file_name` in `dir`.
///
/// `replacing` is the file the new one supersedes; its path counts as free.
/// Otherwise existing files get a numeric suffix: `report.pdf`,
/// `report_1.pdf`, `report_2.pdf`.
pub fn unique_destination(dir: &Path, file_name: &str, replacing: Option<&Path>) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() || replacing == Some(candidate.as_path()) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1;
    loop {
        let file_name = match extension {
            Some(ref ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Regular files directly inside `dir` with the given extension, sorted by
/// name. Used to collect outputs of tools that pick their own file names.
pub async fn list_outputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
