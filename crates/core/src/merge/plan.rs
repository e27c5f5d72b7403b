//! Grouping merge-diverted files into size-capped output documents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::formats::FormatCode;

/// One merge-diverted file.
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    pub id: Uuid,
    pub path: PathBuf,
    pub format: FormatCode,
    pub size: u64,
    /// Directory the merged document is written to.
    pub folder: PathBuf,
    /// Target format of the folder override.
    pub target: Option<FormatCode>,
}

/// Files that become one merged document.
#[derive(Debug, Clone)]
pub struct MergeGroup {
    pub folder: PathBuf,
    pub format: FormatCode,
    pub target: Option<FormatCode>,
    pub members: Vec<MergeCandidate>,
}

impl MergeGroup {
    pub fn size(&self) -> u64 {
        self.members.iter().map(|m| m.size).sum()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.path.clone()).collect()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|m| m.id).collect()
    }
}

/// Groups candidates by destination folder and format, members ordered by
/// path. A new group starts whenever adding the next member would push the
/// group over `max_bytes`; a single oversized file gets a group of its own.
pub fn plan_groups(candidates: Vec<MergeCandidate>, max_bytes: u64) -> Vec<MergeGroup> {
    let mut by_key: BTreeMap<(PathBuf, String), Vec<MergeCandidate>> = BTreeMap::new();
    for candidate in candidates {
        by_key
            .entry((candidate.folder.clone(), candidate.format.as_str().to_string()))
            .or_default()
            .push(candidate);
    }

    let mut groups = Vec::new();
    for ((folder, _), mut members) in by_key {
        members.sort_by(|a, b| a.path.cmp(&b.path));

        let mut current: Vec<MergeCandidate> = Vec::new();
        let mut current_bytes = 0u64;
        for member in members {
            if !current.is_empty() && current_bytes.saturating_add(member.size) > max_bytes {
                groups.push(group(&folder, std::mem::take(&mut current)));
                current_bytes = 0;
            }
            current_bytes = current_bytes.saturating_add(member.size);
            current.push(member);
        }
        if !current.is_empty() {
            groups.push(group(&folder, current));
        }
    }
    groups
}

fn group(folder: &Path, members: Vec<MergeCandidate>) -> MergeGroup {
    MergeGroup {
        folder: folder.to_path_buf(),
        format: members[0].format.clone(),
        target: members[0].target.clone(),
        members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(folder: &str, name: &str, format: &str, size: u64) -> MergeCandidate {
        MergeCandidate {
            id: Uuid::new_v4(),
            path: PathBuf::from(folder).join(name),
            format: FormatCode::from(format),
            size,
            folder: PathBuf::from(folder),
            target: Some(FormatCode::from("fmt/477")),
        }
    }

    #[test]
    fn test_groups_by_folder_and_format() {
        let groups = plan_groups(
            vec![
                candidate("/out/scans", "b.png", "fmt/13", 10),
                candidate("/out/scans", "a.png", "fmt/13", 10),
                candidate("/out/scans", "c.jpg", "fmt/44", 10),
                candidate("/out/other", "d.png", "fmt/13", 10),
            ],
            1000,
        );
        assert_eq!(groups.len(), 3);

        let scans_png = groups
            .iter()
            .find(|g| g.folder == PathBuf::from("/out/scans") && g.format.as_str() == "fmt/13")
            .unwrap();
        let names: Vec<_> = scans_png
            .members
            .iter()
            .map(|m| m.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(scans_png.size(), 20);
    }

    #[test]
    fn test_size_cap_starts_new_group() {
        let groups = plan_groups(
            vec![
                candidate("/out/scans", "a.png", "fmt/13", 60),
                candidate("/out/scans", "b.png", "fmt/13", 60),
            ],
            100,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 1);
        assert_eq!(groups[1].members.len(), 1);
    }

    #[test]
    fn test_exact_cap_fits() {
        let groups = plan_groups(
            vec![
                candidate("/out/scans", "a.png", "fmt/13", 50),
                candidate("/out/scans", "b.png", "fmt/13", 50),
                candidate("/out/scans", "c.png", "fmt/13", 500),
            ],
            100,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].size(), 500);
    }

    #[test]
    fn test_empty() {
        assert!(plan_groups(Vec::new(), 100).is_empty());
    }
}
