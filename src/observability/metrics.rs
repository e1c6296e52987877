//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dev_relay_requests_total` (counter): relayed requests by method, status, outcome
//! - `dev_relay_client_disconnects_total` (counter): requests abandoned by the client, by method
//! - `dev_relay_request_duration_seconds` (histogram): receipt until the response body
//!   ends or the request fails, by method and outcome
//! - `dev_relay_active_connections` (gauge): current client connection count

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const REQUESTS_TOTAL: &str = "dev_relay_requests_total";
const CLIENT_DISCONNECTS_TOTAL: &str = "dev_relay_client_disconnects_total";
const REQUEST_DURATION: &str = "dev_relay_request_duration_seconds";
const ACTIVE_CONNECTIONS: &str = "dev_relay_active_connections";

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record the outcome of one relayed request.
///
/// `status` is what the client saw (upstream's or a synthesized 502/500).
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!(
        REQUEST_DURATION,
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request the client abandoned before its response was delivered.
///
/// No status label: the client never received one.
pub fn record_client_disconnect(method: &str, start: Instant) {
    metrics::counter!(CLIENT_DISCONNECTS_TOTAL, "method" => method.to_string()).increment(1);

    metrics::histogram!(
        REQUEST_DURATION,
        "method" => method.to_string(),
        "outcome" => "client_disconnect"
    )
    .record(start.elapsed().as_secs_f64());
}

pub(crate) fn connection_opened() {
    metrics::gauge!(ACTIVE_CONNECTIONS).increment(1.0);
}

pub(crate) fn connection_closed() {
    metrics::gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
}
