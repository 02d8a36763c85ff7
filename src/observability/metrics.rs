//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, upstream outcomes, connections)
//! - Install the Prometheus recorder and render the `/metrics` body
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, route, status
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_upstream_outcomes_total` (counter): forward results by outcome
//! - `proxy_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - One recorder per process; later servers share the first handle
//! - Recording without an installed recorder is a no-op
//! - Histogram buckets tuned for typical web latencies

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::http::forward::Outcome;
use crate::routing::RouteClass;

pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
pub const REQUEST_DURATION: &str = "proxy_request_duration_seconds";
pub const UPSTREAM_OUTCOMES: &str = "proxy_upstream_outcomes_total";
pub const ACTIVE_CONNECTIONS: &str = "proxy_active_connections";

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static RECORDER: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder once and return its handle.
///
/// Returns `None` when another recorder already owns the process.
pub fn install() -> Option<PrometheusHandle> {
    RECORDER
        .get_or_init(|| {
            let builder = match PrometheusBuilder::new()
                .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)
            {
                Ok(builder) => builder,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid histogram buckets, metrics disabled");
                    return None;
                }
            };
            match builder.install_recorder() {
                Ok(handle) => {
                    tracing::info!("Prometheus recorder installed");
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics recorder unavailable");
                    None
                }
            }
        })
        .clone()
}

/// Record one finished request.
pub fn record_request(method: &str, route: RouteClass, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.as_str().to_string()),
        ("status", status.to_string()),
    ];
    counter!(REQUESTS_TOTAL, &labels[..]).increment(1);
    histogram!(REQUEST_DURATION, &labels[..2]).record(start.elapsed().as_secs_f64());
}

/// Record how a forward attempt ended.
pub fn record_outcome(outcome: Outcome) {
    counter!(UPSTREAM_OUTCOMES, "outcome" => outcome.as_str()).increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}
