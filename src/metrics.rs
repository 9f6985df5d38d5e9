// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Zondy server.
//!
//! All metrics carry the namespace prefix `zondy_firestoned_io_` (the
//! prometheus-safe version of `zondy.firestoned.io`) and are registered in
//! [`METRICS_REGISTRY`], exposed through the `/metrics` endpoint.

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all Zondy metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "zondy_firestoned_io";

/// Global Prometheus metrics registry.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of DNS queries by query type and response code.
pub static DNS_QUERIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_queries_total"),
        "Total number of DNS queries by query type and response code",
    );
    let counter = CounterVec::new(opts, &["qtype", "rcode"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Duration of DNS query handling in seconds.
pub static DNS_QUERY_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_dns_query_duration_seconds"),
        "Duration of DNS query handling in seconds by query type",
    )
    .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]);
    let histogram = HistogramVec::new(opts, &["qtype"]).unwrap();
    METRICS_REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

/// Total number of reconciliations by kind and outcome.
pub static RECONCILIATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Number of objects in the indexed cache, by kind.
pub static CACHE_OBJECTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cache_objects"),
        "Number of objects in the indexed cache by kind",
    );
    let gauge = GaugeVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Number of keys waiting in the work queue.
pub static WORK_QUEUE_DEPTH: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_work_queue_depth"),
        "Number of keys waiting in the work queue",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Record a handled DNS query.
pub fn observe_query(qtype: &str, rcode: &str, duration: Duration) {
    DNS_QUERIES_TOTAL.with_label_values(&[qtype, rcode]).inc();
    DNS_QUERY_DURATION_SECONDS
        .with_label_values(&[qtype])
        .observe(duration.as_secs_f64());
}

/// Record a reconcile outcome (`success`, `error`, `panic`).
pub fn observe_reconcile(kind: &str, outcome: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

/// Publish the cache size for one kind.
pub fn set_cache_objects(kind: &str, len: usize) {
    #[allow(clippy::cast_precision_loss)]
    CACHE_OBJECTS.with_label_values(&[kind]).set(len as f64);
}

/// Publish the work-queue depth.
pub fn set_queue_depth(len: usize) {
    #[allow(clippy::cast_precision_loss)]
    WORK_QUEUE_DEPTH.set(len as f64);
}

/// Gather all registered metrics in the Prometheus text format.
///
/// # Errors
///
/// Returns an error when encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
