//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Record per-request counters and latencies
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rest_requests_total` (counter): requests by method, procedure, status
//! - `rest_request_duration_seconds` (histogram): latency by method, procedure
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Unmatched requests are labelled with procedure `none`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "rest_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "rest_request_duration_seconds";

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, procedure: &str, status: u16, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();

    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "procedure" => procedure.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "procedure" => procedure.to_string()
    )
    .record(elapsed);
}
