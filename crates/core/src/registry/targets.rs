//! Target format resolution from configuration.

use std::path::{Path, PathBuf};

use crate::config::{FolderOverride, FormatSetting};
use crate::formats::FormatCode;

/// Outcome of target resolution for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDecision {
    /// `None` when neither a folder override nor a global setting applies.
    pub target: Option<FormatCode>,
    /// Divert the file to the merge pipeline.
    pub merge: bool,
    /// Folder override that decided, if any.
    pub folder: Option<PathBuf>,
}

/// Computes target formats. Folder overrides take precedence over the global
/// per-format settings; the deepest matching folder wins.
#[derive(Debug, Clone, Default)]
pub struct TargetResolver {
    formats: Vec<FormatSetting>,
    folders: Vec<FolderOverride>,
}

impl TargetResolver {
    pub fn new(formats: Vec<FormatSetting>, folders: Vec<FolderOverride>) -> Self {
        Self { formats, folders }
    }

    /// Resolves the target for a file at `relative_path` (relative to the
    /// output root) currently in `format`.
    pub fn resolve(&self, relative_path: &Path, format: &FormatCode) -> TargetDecision {
        let folder = relative_path.parent().unwrap_or_else(|| Path::new(""));

        let best = self
            .folders
            .iter()
            .filter(|o| folder.starts_with(&o.path) && o.applies_to(format))
            .max_by_key(|o| o.path.components().count());

        if let Some(over) = best {
            return TargetDecision {
                target: over.output.clone(),
                merge: over.merge,
                folder: Some(over.path.clone()),
            };
        }

        let target = self
            .formats
            .iter()
            .find(|s| s.pronoms.contains(format))
            .and_then(|s| {
                if s.do_not_convert {
                    Some(format.clone())
                } else {
                    s.default_target.clone()
                }
            });

        TargetDecision {
            target,
            merge: false,
            folder: None,
        }
    }

    /// Every (source, target) pair the configuration can produce, in
    /// declaration order. Used to pre-compute routes for files that only
    /// appear mid-run.
    pub fn declared_pairs(&self) -> Vec<(FormatCode, FormatCode)> {
        let mut pairs = Vec::new();
        let mut push = |pair: (FormatCode, FormatCode)| {
            if pair.0 != pair.1 && !pairs.contains(&pair) {
                pairs.push(pair);
            }
        };

        for setting in &self.formats {
            if setting.do_not_convert {
                continue;
            }
            if let Some(ref target) = setting.default_target {
                for source in &setting.pronoms {
                    push((source.clone(), target.clone()));
                }
            }
        }

        for folder in &self.folders {
            if let Some(ref output) = folder.output {
                let sources = if folder.pronoms.is_empty() {
                    self.formats.iter().flat_map(|s| s.pronoms.iter()).collect::<Vec<_>>()
                } else {
                    folder.pronoms.iter().collect()
                };
                for source in sources {
                    push((source.clone(), output.clone()));
                }
            }
        }

        pairs
    }
}
