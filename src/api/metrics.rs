//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    refresh_redis_gauges(&state);

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Gauges only move on Redis activity; sync them before each scrape
fn refresh_redis_gauges(state: &AppState) {
    let Some(pool) = &state.redis_pool else {
        return;
    };

    metrics::REDIS_CONNECTION_STATUS.set(i64::from(pool.health().is_healthy()));
    // state() also advances an expired open circuit to half-open
    metrics::REDIS_CIRCUIT_BREAKER_STATE.set(pool.circuit_breaker().state() as i64);
}
