//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cors_proxy_requests_total` (counter): requests by method, status
//! - `cors_proxy_request_duration_seconds` (histogram): latency distribution
//! - `cors_proxy_auth_denied_total` (counter): authorization denials
//! - `cors_proxy_errors_total` (counter): fatal request errors by kind

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    counter!("cors_proxy_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    histogram!("cors_proxy_request_duration_seconds", "method" => method, "status" => status)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_auth_denied() {
    counter!("cors_proxy_auth_denied_total").increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("cors_proxy_errors_total", "kind" => kind).increment(1);
}
