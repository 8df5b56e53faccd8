//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by api, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by api
//! - `gateway_reloads_total` (counter): reloads by outcome
//! - `gateway_auth_failures_total` (counter): rejected credentials by api, status
//! - `gateway_apis_loaded` (gauge): APIs in the published snapshot
//! - `gateway_rpc_connected` (gauge): 1 when the management node answers pings
//! - `gateway_analytics_purged_total` (counter): analytics records drained

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(api_id: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "api_id" => api_id.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "api_id" => api_id.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_reload(outcome: &'static str) {
    counter!("gateway_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_auth_failure(api_id: &str, status: u16) {
    counter!(
        "gateway_auth_failures_total",
        "api_id" => api_id.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_apis_loaded(count: usize) {
    gauge!("gateway_apis_loaded").set(count as f64);
}

pub fn record_rpc_connected(connected: bool) {
    gauge!("gateway_rpc_connected").set(if connected { 1.0 } else { 0.0 });
}

pub fn record_analytics_purged(count: usize) {
    counter!("gateway_analytics_purged_total").increment(count as u64);
}
