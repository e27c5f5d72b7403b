//! Workspace preparation: the input tree is copied into the output folder and
//! every later phase works on the copy.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("input folder not found: {0}")]
    InputNotFound(PathBuf),

    #[error("input and output folders must differ: {0}")]
    SameFolder(PathBuf),

    #[error("failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace preparation aborted: {0}")]
    Join(String),
}

/// Copies every regular file below `input` to the same relative location below
/// `output` and returns the copied paths, sorted.
///
/// An output folder nested inside the input folder is skipped while walking.
/// Existing files in the output folder are overwritten.
pub async fn prepare_workspace(input: &Path, output: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree(&input, &output))
        .await
        .map_err(|e| DiscoveryError::Join(e.to_string()))?
}

fn copy_tree(input: &Path, output: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !input.is_dir() {
        return Err(DiscoveryError::InputNotFound(input.to_path_buf()));
    }
    std::fs::create_dir_all(output).map_err(|source| DiscoveryError::Copy {
        path: output.to_path_buf(),
        source,
    })?;
    let input = absolute(input);
    let output = absolute(output);
    if input == output {
        return Err(DiscoveryError::SameFolder(input));
    }

    let mut copied = Vec::new();
    let walker = WalkDir::new(&input)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != output);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(&input).unwrap_or(entry.path());
        let destination = output.join(relative);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DiscoveryError::Copy {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::copy(entry.path(), &destination).map_err(|source| DiscoveryError::Copy {
            path: entry.path().to_path_buf(),
            source,
        })?;
        debug!(path = %relative.display(), "Copied input file");
        copied.push(destination);
    }

    copied.sort();
    info!(
        files = copied.len(),
        input = %input.display(),
        output = %output.display(),
        "Workspace prepared"
    );
    Ok(copied)
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_copies_tree_and_leaves_input_untouched() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(input.join("letters/2019")).unwrap();
        std::fs::write(input.join("a.doc"), b"a").unwrap();
        std::fs::write(input.join("letters/2019/b.doc"), b"b").unwrap();

        let output = dir.path().join("out");
        let files = prepare_workspace(&input, &output).await.unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.starts_with(absolute(&output))));
        assert_eq!(std::fs::read(output.join("letters/2019/b.doc")).unwrap(), b"b");
        assert!(input.join("a.doc").exists());
    }

    #[tokio::test]
    async fn test_skips_output_nested_in_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(input.join("out")).unwrap();
        std::fs::write(input.join("a.doc"), b"a").unwrap();
        std::fs::write(input.join("out/stale.pdf"), b"x").unwrap();

        let files = assert_ok!(prepare_workspace(&input, &input.join("out")).await);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.doc"));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let result = prepare_workspace(&dir.path().join("missing"), &dir.path().join("out")).await;
        assert!(matches!(result, Err(DiscoveryError::InputNotFound(_))));
    }

    #[tokio::test]
    async fn test_same_folder_rejected() {
        let dir = TempDir::new().unwrap();
        let result = prepare_workspace(dir.path(), dir.path()).await;
        assert!(matches!(result, Err(DiscoveryError::SameFolder(_))));
    }
}
