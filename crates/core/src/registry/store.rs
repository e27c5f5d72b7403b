//! Concurrent file table.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::record::FileRecord;

/// Shared table of all files in the run.
///
/// Cheap to clone; all clones see the same table. Every method takes the lock
/// once, so each insert/update is atomic with respect to concurrent dispatches.
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    files: Arc<RwLock<HashMap<Uuid, FileRecord>>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record and returns its id.
    pub async fn insert(&self, record: FileRecord) -> Uuid {
        let id = record.id;
        self.files.write().await.insert(id, record);
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<FileRecord> {
        self.files.read().await.get(id).cloned()
    }

    /// Applies `f` to the record under the write lock.
    ///
    /// Returns `None` when no record has this id.
    pub async fn update<F, R>(&self, id: &Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut FileRecord) -> R,
    {
        self.files.write().await.get_mut(id).map(f)
    }

    /// All records ordered by original path.
    pub async fn records(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.files.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.original_path.cmp(&b.original_path).then(a.id.cmp(&b.id)));
        records
    }

    pub async fn find_by_path(&self, path: &Path) -> Option<FileRecord> {
        self.files
            .read()
            .await
            .values()
            .find(|r| r.path == path)
            .cloned()
    }

    /// Records derived from `parent`.
    pub async fn children(&self, parent: &Uuid) -> Vec<FileRecord> {
        let mut children: Vec<FileRecord> = self
            .files
            .read()
            .await
            .values()
            .filter(|r| r.parent.as_ref() == Some(parent))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        children
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatCode;
    use crate::identifier::FileIdentity;
    use std::path::PathBuf;

    fn record(path: &str) -> FileRecord {
        let identity = FileIdentity {
            path: PathBuf::from(path),
            format: FormatCode::from("fmt/40"),
            ..Default::default()
        };
        FileRecord::from_identity(Path::new(path), &identity)
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let registry = FileRegistry::new();
        let id = registry.insert(record("/out/a.doc")).await;

        assert_eq!(registry.len().await, 1);
        let updated = registry
            .update(&id, |r| {
                r.flags.failed = true;
                r.flags.failed
            })
            .await;
        assert_eq!(updated, Some(true));
        assert!(registry.get(&id).await.unwrap().flags.failed);

        assert!(registry.update(&Uuid::new_v4(), |_| ()).await.is_none());
    }

    #[tokio::test]
    async fn test_records_sorted_and_children() {
        let registry = FileRegistry::new();
        let parent = registry.insert(record("/out/b.eml")).await;
        registry.insert(record("/out/a.doc")).await;

        let mut child = record("/out/b-attachments/c.png");
        child.parent = Some(parent);
        registry.insert(child).await;

        let records = registry.records().await;
        assert_eq!(records[0].original_path, PathBuf::from("/out/a.doc"));
        assert_eq!(registry.children(&parent).await.len(), 1);
        assert!(registry
            .find_by_path(Path::new("/out/a.doc"))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let registry = FileRegistry::new();
        let id = registry.insert(record("/out/a.doc")).await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .update(&id, |r| r.converted_by.push(format!("tool-{}", i)))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.get(&id).await.unwrap().converted_by.len(), 16);
    }
}
