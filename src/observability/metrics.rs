//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_connections_accepted_total` (counter)
//! - `dispatch_accept_errors_total` (counter)
//! - `dispatch_errors_total` (counter): by `kind` (spawn, session)
//! - `dispatch_requests_total` (counter): completed request/response cycles
//! - `dispatch_active_sessions` (gauge)
//! - `dispatch_session_duration_seconds` (histogram)
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted() {
    counter!("dispatch_connections_accepted_total").increment(1);
}

pub fn record_accept_error() {
    counter!("dispatch_accept_errors_total").increment(1);
}

pub fn record_dispatch_error(kind: &'static str) {
    counter!("dispatch_errors_total", "kind" => kind).increment(1);
}

pub fn record_request() {
    counter!("dispatch_requests_total").increment(1);
}

pub fn record_session_duration(start: Instant) {
    histogram!("dispatch_session_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub(crate) fn session_started() {
    gauge!("dispatch_active_sessions").increment(1.0);
}

pub(crate) fn session_finished() {
    gauge!("dispatch_active_sessions").decrement(1.0);
}
