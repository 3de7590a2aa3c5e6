//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by route, method, status
//! - `http_request_duration_seconds` (histogram): latency by route, method
//! - `latency_sampled_seconds` (histogram): injected delay by shape
//! - `injected_failures_total` (counter): synthetic failures by route
//! - `log_deliveries_total` (counter): shipper outcomes
//! - `build_info` (gauge): always 1, labelled with service, version,
//!   commit and branch
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Buckets tuned for sub-second synthetic latencies.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Install the global Prometheus recorder and publish `build_info`.
pub fn init_metrics(service_name: &str) -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), LATENCY_BUCKETS)?
        .install_recorder()?;

    describe_counter!("http_requests_total", "Total HTTP requests handled");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency"
    );
    describe_histogram!(
        "latency_sampled_seconds",
        Unit::Seconds,
        "Synthetic delay drawn by the latency sampler"
    );
    describe_counter!("injected_failures_total", "Synthetic failures raised");
    describe_counter!("log_deliveries_total", "Log shipping attempts by outcome");
    describe_gauge!("build_info", "Build information");
    publish_build_info(service_name);

    tracing::info!(service = service_name, "Metrics recorder installed");
    Ok(handle)
}

/// Set `build_info` to 1. `GIT_COMMIT` and `GIT_BRANCH` are read at
/// compile time.
pub fn publish_build_info(service_name: &str) {
    gauge!(
        "build_info",
        "service" => service_name.to_string(),
        "version" => env!("CARGO_PKG_VERSION"),
        "commit" => option_env!("GIT_COMMIT").unwrap_or("unknown"),
        "branch" => option_env!("GIT_BRANCH").unwrap_or("unknown")
    )
    .set(1.0);
}

/// Record a completed request.
pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "route" => route.to_string(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_sampled_delay(shape: &'static str, secs: f64) {
    histogram!("latency_sampled_seconds", "shape" => shape).record(secs);
}

pub fn record_injected_failure(route: &'static str) {
    counter!("injected_failures_total", "route" => route).increment(1);
}

pub fn record_log_delivery(outcome: &'static str) {
    counter!("log_deliveries_total", "outcome" => outcome).increment(1);
}
