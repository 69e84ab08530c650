//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with operation-class histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Reelsmith metrics
pub const METRICS_PREFIX: &str = "reelsmith";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for vendor API calls (image/chat/speech, typically slower)
pub const VENDOR_BUCKETS: &[f64] = &[
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 60s
];

/// Buckets for whole pipeline segments (synthesis + polling dominates)
pub const SEGMENT_BUCKETS: &[f64] = &[
    5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Vendor metrics
    describe_counter!(
        format!("{}_vendor_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total vendor API requests"
    );

    describe_counter!(
        format!("{}_vendor_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total vendor API errors"
    );

    describe_histogram!(
        format!("{}_vendor_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Vendor API call latency in seconds"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total video pipeline runs"
    );

    describe_counter!(
        format!("{}_pipeline_segments_total", METRICS_PREFIX),
        Unit::Count,
        "Total video segments rendered"
    );

    describe_histogram!(
        format!("{}_pipeline_segment_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Wall-clock time to produce one segment"
    );

    describe_gauge!(
        format!("{}_jobs_live", METRICS_PREFIX),
        Unit::Count,
        "Jobs currently held in the in-memory store"
    );

    // Usage metrics
    describe_counter!(
        format!("{}_usage_tracked_total", METRICS_PREFIX),
        Unit::Count,
        "Billable actions tracked"
    );

    describe_counter!(
        format!("{}_quota_denials_total", METRICS_PREFIX),
        Unit::Count,
        "Requests denied by the free-tier quota"
    );

    // Feed metrics
    describe_counter!(
        format!("{}_feed_fetch_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Feed sources that failed to fetch or parse"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one vendor API call
pub fn record_vendor_call(vendor: &'static str, operation: &'static str, duration_secs: f64, ok: bool) {
    counter!(
        format!("{}_vendor_requests_total", METRICS_PREFIX),
        "vendor" => vendor,
        "operation" => operation
    )
    .increment(1);

    if !ok {
        counter!(
            format!("{}_vendor_errors_total", METRICS_PREFIX),
            "vendor" => vendor,
            "operation" => operation
        )
        .increment(1);
    }

    histogram!(
        format!("{}_vendor_duration_seconds", METRICS_PREFIX),
        "vendor" => vendor,
        "operation" => operation
    )
    .record(duration_secs);
}

/// Record one completed pipeline segment
pub fn record_segment(duration_secs: f64) {
    counter!(format!("{}_pipeline_segments_total", METRICS_PREFIX)).increment(1);
    histogram!(format!("{}_pipeline_segment_duration_seconds", METRICS_PREFIX))
        .record(duration_secs);
}

/// Record the outcome of a pipeline run
pub fn record_pipeline_run(outcome: &'static str) {
    counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

/// Update the live-jobs gauge after a sweep or insert
pub fn set_jobs_live(count: usize) {
    gauge!(format!("{}_jobs_live", METRICS_PREFIX)).set(count as f64);
}

/// Record a tracked billable action
pub fn record_usage(kind: &str, qty: u64) {
    counter!(
        format!("{}_usage_tracked_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(qty);
}

/// Record a quota denial
pub fn record_quota_denial(kind: &str) {
    counter!(
        format!("{}_quota_denials_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a failed feed source
pub fn record_feed_error(source: &str) {
    counter!(
        format!("{}_feed_fetch_errors_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);
}
