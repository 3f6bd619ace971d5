//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERY_LATENCY, RATELIMIT_ALLOWED_TOTAL, RATELIMIT_DENIED_TOTAL,
    RATELIMIT_ROLLBACKS_TOTAL, RATELIMIT_ROLLBACK_FAILURES_TOTAL, SEND_OUTCOMES_TOTAL,
    STORE_ERRORS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a terminal outcome of a send request
    pub fn record_outcome(outcome: &str) {
        SEND_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record how long the transport took to accept a message
    pub fn record_delivery_latency(elapsed: Duration) {
        DELIVERY_LATENCY.observe(elapsed.as_secs_f64());
    }
}

/// Helper struct for recording rate limit metrics
pub struct RateLimitMetrics;

impl RateLimitMetrics {
    pub fn record_allowed(category: &str) {
        RATELIMIT_ALLOWED_TOTAL.with_label_values(&[category]).inc();
    }

    pub fn record_denied(category: &str) {
        RATELIMIT_DENIED_TOTAL.with_label_values(&[category]).inc();
    }

    pub fn record_rollback() {
        RATELIMIT_ROLLBACKS_TOTAL.inc();
    }

    pub fn record_rollback_failure() {
        RATELIMIT_ROLLBACK_FAILURES_TOTAL.inc();
    }
}

/// Helper struct for counter store metrics
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_error(backend: &str, operation: &str) {
        STORE_ERRORS_TOTAL
            .with_label_values(&[backend, operation])
            .inc();
    }
}
