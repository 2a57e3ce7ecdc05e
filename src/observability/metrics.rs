//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sendfile_requests_total` (counter): requests by outcome
//!   (`passthrough`, `streamed`, `forbidden`, `not_found`, `io_error`,
//!   `write_error`, `capture_error`)
//! - `sendfile_bytes_total` (counter): file bytes streamed to clients
//! - `sendfile_upstream_errors_total` (counter): upstream forwarding failures
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - The Prometheus listener is optional and owned by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one handled request by outcome label.
pub fn record_outcome(outcome: &'static str) {
    metrics::counter!("sendfile_requests_total", "outcome" => outcome).increment(1);
}

/// Add streamed file bytes.
pub fn record_streamed_bytes(bytes: u64) {
    metrics::counter!("sendfile_bytes_total").increment(bytes);
}

/// Count an upstream forwarding failure.
pub fn record_upstream_error() {
    metrics::counter!("sendfile_upstream_errors_total").increment(1);
}
