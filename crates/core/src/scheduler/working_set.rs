//! The in-flight files of a scheduling run.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::formats::FormatCode;
use crate::registry::FileRecord;

/// Snapshot of one in-flight file.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub file_id: Uuid,
    pub path: PathBuf,
    pub current_format: FormatCode,
    /// Remaining hops, consumed from the front.
    pub route: VecDeque<FormatCode>,
    /// Added mid-run and not yet through a generation.
    pub fresh: bool,
}

impl WorkItem {
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            file_id: record.id,
            path: record.path.clone(),
            current_format: record.current_format.clone(),
            route: record.route.clone(),
            fresh: false,
        }
    }

    pub fn fresh(mut self) -> Self {
        self.fresh = true;
        self
    }

    pub fn next_hop(&self) -> Option<&FormatCode> {
        self.route.front()
    }

    /// Applies a completed hop. Returns true when the route is exhausted.
    pub fn advance(&mut self, path: PathBuf, format: FormatCode) -> bool {
        self.route.pop_front();
        self.path = path;
        self.current_format = format;
        self.fresh = false;
        self.route.is_empty()
    }
}

/// Concurrent map of in-flight files.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    items: Arc<RwLock<HashMap<Uuid, WorkItem>>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, item: WorkItem) {
        self.items.write().await.insert(item.file_id, item);
    }

    pub async fn remove(&self, id: &Uuid) -> Option<WorkItem> {
        self.items.write().await.remove(id)
    }

    pub async fn get(&self, id: &Uuid) -> Option<WorkItem> {
        self.items.read().await.get(id).cloned()
    }

    /// Applies `f` to the item under the write lock.
    pub async fn update<F, R>(&self, id: &Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut WorkItem) -> R,
    {
        self.items.write().await.get_mut(id).map(f)
    }

    pub async fn contains(&self, id: &Uuid) -> bool {
        self.items.read().await.contains_key(id)
    }

    /// All items ordered by path, so dispatch order is reproducible.
    pub async fn snapshot(&self) -> Vec<WorkItem> {
        let mut items: Vec<WorkItem> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.path.cmp(&b.path).then(a.file_id.cmp(&b.file_id)));
        items
    }

    /// Removes and returns everything left.
    pub async fn drain(&self) -> Vec<WorkItem> {
        let mut items: Vec<WorkItem> = self.items.write().await.drain().map(|(_, v)| v).collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        items
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}
