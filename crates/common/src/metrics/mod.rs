//! Metrics for the harvest and analysis stages
//!
//! Uses the `metrics` facade; without an installed recorder every call is a
//! no-op, so the pipelines can record unconditionally.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Collabnet metrics
pub const METRICS_PREFIX: &str = "collabnet";

/// Buckets for upstream request latency (in seconds)
pub const REQUEST_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s - request timeout
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total Scopus API requests by kind and outcome"
    );

    describe_histogram!(
        format!("{}_upstream_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Scopus API request latency in seconds"
    );

    describe_counter!(
        format!("{}_pages_fetched_total", METRICS_PREFIX),
        Unit::Count,
        "Search result pages retrieved"
    );

    describe_counter!(
        format!("{}_publications_total", METRICS_PREFIX),
        Unit::Count,
        "Publication records flattened"
    );

    describe_counter!(
        format!("{}_authors_total", METRICS_PREFIX),
        Unit::Count,
        "Author records retrieved"
    );

    describe_counter!(
        format!("{}_malformed_entries_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Search entries skipped for missing author-affiliation links"
    );

    describe_histogram!(
        format!("{}_build_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Collaborator table build time"
    );

    describe_counter!(
        format!("{}_names_resolved_total", METRICS_PREFIX),
        Unit::Count,
        "Coauthor identifiers given a canonical name"
    );

    tracing::debug!("Metrics registered");
}

/// Helper to record upstream request metrics
pub struct RequestMetrics {
    start: Instant,
    kind: &'static str,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(kind: &'static str) -> Self {
        Self {
            start: Instant::now(),
            kind,
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_upstream_requests_total", METRICS_PREFIX),
            "kind" => self.kind,
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_upstream_request_duration_seconds", METRICS_PREFIX),
            "kind" => self.kind
        )
        .record(duration);
    }
}

pub fn record_pages(count: usize) {
    counter!(format!("{}_pages_fetched_total", METRICS_PREFIX)).increment(count as u64);
}

pub fn record_publications(count: usize, seed_author_id: &str) {
    counter!(
        format!("{}_publications_total", METRICS_PREFIX),
        "seed" => seed_author_id.to_string()
    )
    .increment(count as u64);
}

pub fn record_authors(count: usize) {
    counter!(format!("{}_authors_total", METRICS_PREFIX)).increment(count as u64);
}

pub fn record_skipped_entry() {
    counter!(format!("{}_malformed_entries_skipped_total", METRICS_PREFIX)).increment(1);
}

pub fn record_build(duration_secs: f64) {
    histogram!(format!("{}_build_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

pub fn record_resolution(resolved: usize) {
    counter!(format!("{}_names_resolved_total", METRICS_PREFIX)).increment(resolved as u64);
}
