//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, attempts, endpoint health)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_downstream_attempts_total` (counter): attempts by route, outcome
//! - `gateway_endpoint_health` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_rate_limited_total` (counter): rejected requests by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed exporter
//!   every call is a no-op
//! - Labels for route, endpoint, status code

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(route: &str, method: &str, status: u16, elapsed: Duration) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record a single downstream attempt and how it ended.
pub fn record_attempt(route: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_downstream_attempts_total",
        "route" => route.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an endpoint health change.
pub fn record_endpoint_health(endpoint: &str, healthy: bool) {
    metrics::gauge!("gateway_endpoint_health", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited(route: &str) {
    metrics::counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}
