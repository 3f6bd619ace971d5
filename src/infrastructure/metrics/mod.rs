//! Prometheus metrics for the mail notification service.
//!
//! This module provides metrics for monitoring the dispatch pipeline:
//! - Send outcomes (success, duplicate, rate limited, ...)
//! - Rate limit admissions, denials and compensating rollbacks
//! - Delivery latency
//! - Counter store and Redis health

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, RateLimitMetrics, StoreMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara_mail";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Send attempts by terminal outcome
    pub static ref SEND_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_send_outcomes_total", METRIC_PREFIX),
        "Total send requests by terminal outcome",
        &["outcome"]
    ).unwrap();

    /// Transport delivery latency
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Mail transport delivery latency in seconds",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Rate Limiting Metrics
    // ============================================================================

    /// Admissions granted by the rate limiter
    pub static ref RATELIMIT_ALLOWED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_ratelimit_allowed_total", METRIC_PREFIX),
        "Total admissions granted by the rate limiter",
        &["category"]
    ).unwrap();

    /// Requests denied by the rate limiter
    pub static ref RATELIMIT_DENIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_ratelimit_denied_total", METRIC_PREFIX),
        "Total requests denied by the rate limiter",
        &["category"]
    ).unwrap();

    /// Compensating releases performed after failed deliveries
    pub static ref RATELIMIT_ROLLBACKS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_ratelimit_rollbacks_total", METRIC_PREFIX),
        "Total compensating rate limit releases"
    ).unwrap();

    /// Compensating releases that failed (slot wasted until expiry)
    pub static ref RATELIMIT_ROLLBACK_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_ratelimit_rollback_failures_total", METRIC_PREFIX),
        "Total compensating rate limit releases that failed"
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Counter store errors by operation
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total counter store errors",
        &["backend", "operation"]
    ).unwrap();

    /// Redis connection status (1 = connected, 0 = disconnected)
    pub static ref REDIS_CONNECTION_STATUS: IntGauge = register_int_gauge!(
        format!("{}_redis_connection_status", METRIC_PREFIX),
        "Redis connection status (1=connected, 0=disconnected)"
    ).unwrap();

    /// Redis circuit breaker state (0=closed, 1=open, 2=half-open)
    pub static ref REDIS_CIRCUIT_BREAKER_STATE: IntGauge = register_int_gauge!(
        format!("{}_redis_circuit_breaker_state", METRIC_PREFIX),
        "Redis circuit breaker state (0=closed, 1=open, 2=half-open)"
    ).unwrap();
}
