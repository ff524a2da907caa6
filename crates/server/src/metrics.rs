//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the batch server:
//! - HTTP request metrics (latency, counts, errors)
//! - Combinations by status and capacity usage (collected dynamically)
//!
//! Core component metrics are registered into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use gtfs_batch_core::{CapacityLedger, CombinationFilter, CombinationStatus, CombinationStore};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gtfs_batch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0, 900.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gtfs_batch_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "gtfs_batch_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics (collected dynamically)
// =============================================================================

/// Combinations by status.
pub static COMBINATIONS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "gtfs_batch_combinations_by_status",
            "Number of registered combinations in each status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Capacity slots in use.
pub static CAPACITY_IN_USE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "gtfs_batch_capacity_in_use",
        "Capacity slots currently held by in-flight combinations",
    )
    .unwrap()
});

/// Capacity ceiling.
pub static CAPACITY_MAX: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "gtfs_batch_capacity_max_concurrent",
        "Maximum number of concurrent in-flight combinations",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Batch
    registry
        .register(Box::new(COMBINATIONS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(CAPACITY_IN_USE.clone()))
        .unwrap();
    registry.register(Box::new(CAPACITY_MAX.clone())).unwrap();

    // Core metrics (transitions, admissions, job runner calls)
    for metric in gtfs_batch_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the store at scrape time.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let store = state.store();

    if let Ok(snapshot) = store.snapshot() {
        CAPACITY_IN_USE.set(snapshot.in_use as i64);
        CAPACITY_MAX.set(snapshot.max_concurrent as i64);
    }

    for status in CombinationStatus::ALL {
        let filter = CombinationFilter::new().with_status(status);
        if let Ok(count) = store.count(&filter) {
            COMBINATIONS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count as i64);
        }
    }
}

/// Normalize a path for metric labels (replace combination keys with placeholders).
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();

    match segments.iter().position(|s| *s == "combinations") {
        Some(i) if segments.len() >= i + 4 => {
            let mut normalized = segments[..=i].to_vec();
            normalized.extend(["{enterprise}", "{contract}", "{version}"]);
            normalized.extend_from_slice(&segments[i + 4..]);
            normalized.join("/")
        }
        _ => path.to_string(),
    }
}
