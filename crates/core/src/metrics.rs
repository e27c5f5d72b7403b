//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Dispatch (hops, attempts, durations per converter)
//! - Scheduling (generations, working-set size)
//! - Run outcome (files by final status, merges, identification)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Hops total by converter and result.
pub static HOPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_hops_total", "Total conversion hops dispatched"),
        &["converter", "result"], // "success", "failed"
    )
    .unwrap()
});

/// Attempts total by converter and outcome.
pub static HOP_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_hop_attempts_total", "Total conversion attempts"),
        &["converter", "outcome"], // "success", "timeout", "verification_failed", "error"
    )
    .unwrap()
});

/// Hop duration in seconds, retries included.
pub static HOP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("archivist_hop_duration_seconds", "Duration of conversion hops")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 1200.0]),
        &["converter"],
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Generations run total.
pub static GENERATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("archivist_generations_total", "Total scheduler generations").unwrap()
});

/// Current working-set size.
pub static WORKING_SET_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("archivist_working_set_size", "Files currently in the working set").unwrap()
});

/// Files dropped from the working set because no converter handles their next hop.
pub static FILES_UNSUPPORTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "archivist_files_unsupported_total",
        "Files without a usable conversion route",
    )
    .unwrap()
});

// =============================================================================
// Run Metrics
// =============================================================================

/// Files identified total by result.
pub static FILES_IDENTIFIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_files_identified_total", "Total files identified"),
        &["result"], // "identified", "unknown"
    )
    .unwrap()
});

/// Files by final status after the consistency check.
pub static FILES_FINAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_files_final_total", "Files by final status"),
        &["status"], // "converted", "failed", "not_supported", "output_not_set", "merged", "unconverted"
    )
    .unwrap()
});

/// Merge outputs total by result.
pub static MERGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_merges_total", "Total merge outputs"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Dispatch
        Box::new(HOPS_TOTAL.clone()),
        Box::new(HOP_ATTEMPTS.clone()),
        Box::new(HOP_DURATION.clone()),
        // Scheduler
        Box::new(GENERATIONS_TOTAL.clone()),
        Box::new(WORKING_SET_SIZE.clone()),
        Box::new(FILES_UNSUPPORTED.clone()),
        // Run
        Box::new(FILES_IDENTIFIED.clone()),
        Box::new(FILES_FINAL.clone()),
        Box::new(MERGES_TOTAL.clone()),
    ]
}

/// Registers every core metric with `registry`.
pub fn register_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
