//! Moving routes from the table onto file records.

use std::collections::VecDeque;

use super::table::RouteTable;
use crate::formats::FormatCode;
use crate::registry::{FileRecord, FileRegistry};

/// Whether the record should travel the hop pipeline.
fn routable(record: &FileRecord) -> bool {
    record.is_live()
        && !record.flags.should_merge
        && !record.flags.failed
        && !record.flags.not_supported
        && record.needs_conversion()
}

/// `(current, target)` keys of every record that still needs converting,
/// in registry order and without duplicates.
pub async fn route_keys(files: &FileRegistry) -> Vec<(FormatCode, FormatCode)> {
    let mut keys = Vec::new();
    for record in files.records().await {
        if !routable(&record) {
            continue;
        }
        if let Some(target) = record.target_format.clone() {
            let key = (record.current_format.clone(), target);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Copies each record's route from the table. Records without a table entry
/// get an empty route and are left for the scheduler to mark unsupported.
///
/// Returns the number of records that received a route.
pub async fn assign_routes(files: &FileRegistry, table: &RouteTable) -> usize {
    let mut assigned = 0;
    for record in files.records().await {
        if !routable(&record) {
            continue;
        }
        let Some(target) = record.target_format.as_ref() else {
            continue;
        };
        let route: VecDeque<FormatCode> = table
            .get(&record.current_format, target)
            .map(|hops| hops.iter().cloned().collect())
            .unwrap_or_default();
        if !route.is_empty() {
            assigned += 1;
        }
        files.update(&record.id, |r| r.route = route).await;
    }
    assigned
}
