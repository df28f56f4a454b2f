//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): terminal outcomes by `outcome`
//! - `relay_attempts_total` (counter): fee-level attempts by `result`
//! - `relay_network_retries_total` (counter): same-plan rebroadcasts
//! - `relay_nonce_leases_total` (counter): nonce events by `action`
//! - `relay_inflight_requests` (gauge): requests not yet terminal
//! - `relay_fee_paid_wei` (histogram): fee of included transactions
//! - `relay_confirmation_polls_total` (counter): receipt polls

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    metrics::counter!("relay_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_attempt(result: &'static str) {
    metrics::counter!("relay_attempts_total", "result" => result).increment(1);
}

pub fn record_network_retry() {
    metrics::counter!("relay_network_retries_total").increment(1);
}

/// `action` is one of `lease`, `commit`, `abandon`.
pub fn record_nonce(action: &'static str) {
    metrics::counter!("relay_nonce_leases_total", "action" => action).increment(1);
}

pub fn inflight_started() {
    metrics::gauge!("relay_inflight_requests").increment(1.0);
}

pub fn inflight_finished() {
    metrics::gauge!("relay_inflight_requests").decrement(1.0);
}

pub fn record_fee_paid(wei: f64) {
    metrics::histogram!("relay_fee_paid_wei").record(wei);
}

pub fn record_confirmation_poll() {
    metrics::counter!("relay_confirmation_polls_total").increment(1);
}
