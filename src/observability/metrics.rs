//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded requests by kind, status
//! - `proxy_request_duration_seconds` (histogram): forwarding latency by kind
//! - `proxy_forward_errors_total` (counter): forwarding failures by kind, error
//! - `proxy_login_total` (counter): login bridge outcomes by stage
//! - `proxy_active_websockets` (gauge): currently spliced upgrade tunnels

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// One forwarded request, successful or not.
pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_forward_error(kind: &'static str, error: &'static str) {
    metrics::counter!("proxy_forward_errors_total", "kind" => kind, "error" => error).increment(1);
}

pub fn record_login(stage: &'static str, outcome: &'static str) {
    metrics::counter!("proxy_login_total", "stage" => stage, "outcome" => outcome).increment(1);
}

/// Holds `proxy_active_websockets` up for as long as a tunnel lives.
pub struct WebSocketGauge(());

impl WebSocketGauge {
    pub fn open() -> Self {
        metrics::gauge!("proxy_active_websockets").increment(1.0);
        Self(())
    }
}

impl Drop for WebSocketGauge {
    fn drop(&mut self) {
        metrics::gauge!("proxy_active_websockets").decrement(1.0);
    }
}
