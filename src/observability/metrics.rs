//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): finished requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rejections_total` (counter): gateway rejections by reason
//! - `gateway_suspicious_requests_total` (counter): pattern matches by category
//! - `gateway_bad_bots_total` (counter): bad-bot classifications
//! - `audit_dropped_total` (counter): audit records that never reached disk
//! - `analytics_events_total` (counter): ingested analytics events by type
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op (tests, metrics disabled)
//! - Exporter is the Prometheus HTTP listener, enabled by config

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("gateway_rejections_total", "reason" => reason).increment(1);
}

pub fn record_suspicious(category: &'static str) {
    counter!("gateway_suspicious_requests_total", "category" => category).increment(1);
}

pub fn record_bad_bot() {
    counter!("gateway_bad_bots_total").increment(1);
}

pub fn record_audit_dropped() {
    counter!("audit_dropped_total").increment(1);
}

pub fn record_analytics_event(event: &'static str) {
    counter!("analytics_events_total", "event" => event).increment(1);
}
