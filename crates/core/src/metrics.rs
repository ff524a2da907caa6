//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Combination state transitions and registration
//! - Scheduler admissions and tick durations
//! - Job Runner calls (preprocess, start, poll, cancel)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Combination Metrics
// =============================================================================

/// Committed state transitions.
pub static TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gtfs_batch_transitions_total",
            "Committed combination state transitions",
        ),
        &["from_status", "to_status"],
    )
    .unwrap()
});

/// Registration outcomes.
pub static REGISTRATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gtfs_batch_registrations_total",
            "Combinations offered for registration by outcome",
        ),
        &["result"], // "registered", "skipped", "invalid", "error"
    )
    .unwrap()
});

/// Operator resets.
pub static RESETS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gtfs_batch_resets_total", "Failed combinations reset"),
        &["result"], // "reset", "abandoned"
    )
    .unwrap()
});

// =============================================================================
// Scheduler / Reconciler Metrics
// =============================================================================

/// Admission attempts by outcome.
pub static ADMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gtfs_batch_admissions_total", "Admission attempts"),
        &["result"], // "admitted", "capacity_exhausted", "lost_race"
    )
    .unwrap()
});

/// Compute job starts that failed.
pub static DISPATCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gtfs_batch_dispatch_failures_total",
            "Compute job starts that failed",
        ),
        &["kind"], // "compute_a", "compute_b"
    )
    .unwrap()
});

/// Combinations forced to failed because their jobs ran too long.
pub static TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gtfs_batch_timeouts_total",
        "Processing combinations failed by the timeout sweep",
    )
    .unwrap()
});

/// Tick duration in seconds.
pub static TICK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("gtfs_batch_tick_duration_seconds", "Duration of a tick")
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0]),
        &["tick"], // "scheduler", "reconciler"
    )
    .unwrap()
});

// =============================================================================
// Job Runner Metrics
// =============================================================================

/// Job Runner call duration.
pub static JOB_RUNNER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gtfs_batch_job_runner_duration_seconds",
            "Duration of Job Runner calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["operation"],
    )
    .unwrap()
});

/// Job Runner calls total.
pub static JOB_RUNNER_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gtfs_batch_job_runner_calls_total",
            "Total Job Runner calls",
        ),
        &["operation", "status"], // status: "success", "error", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TRANSITIONS.clone()),
        Box::new(REGISTRATIONS.clone()),
        Box::new(RESETS.clone()),
        Box::new(ADMISSIONS.clone()),
        Box::new(DISPATCH_FAILURES.clone()),
        Box::new(TIMEOUTS.clone()),
        Box::new(TICK_DURATION.clone()),
        Box::new(JOB_RUNNER_DURATION.clone()),
        Box::new(JOB_RUNNER_CALLS.clone()),
    ]
}
