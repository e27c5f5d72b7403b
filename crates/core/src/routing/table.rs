//! Conversion routes keyed by (current, target).

use serde::Serialize;
use std::collections::HashMap;

use crate::formats::FormatCode;

/// `(current, target) -> hops`. The last hop is always the target.
///
/// Built once before scheduling and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<(FormatCode, FormatCode), Vec<FormatCode>>,
}

/// One row of the table, for reports and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub from: FormatCode,
    pub to: FormatCode,
    pub hops: Vec<FormatCode>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: FormatCode, to: FormatCode, hops: Vec<FormatCode>) {
        self.routes.insert((from, to), hops);
    }

    pub fn get(&self, from: &FormatCode, to: &FormatCode) -> Option<&[FormatCode]> {
        self.routes
            .get(&(from.clone(), to.clone()))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, from: &FormatCode, to: &FormatCode) -> bool {
        self.get(from, to).is_some()
    }

    /// Keeps only the routes for which `keep` returns true. Returns the
    /// number of removed routes.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&FormatCode, &[FormatCode]) -> bool,
    {
        let before = self.routes.len();
        self.routes.retain(|(from, _), hops| keep(from, hops));
        before - self.routes.len()
    }

    /// All routes sorted by source then target.
    pub fn entries(&self) -> Vec<RouteEntry> {
        let mut entries: Vec<RouteEntry> = self
            .routes
            .iter()
            .map(|((from, to), hops)| RouteEntry {
                from: from.clone(),
                to: to.clone(),
                hops: hops.clone(),
            })
            .collect();
        entries.sort_by(|a, b| {
            a.from
                .as_str()
                .cmp(b.from.as_str())
                .then_with(|| a.to.as_str().cmp(b.to.as_str()))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
