//! Liveness, readiness and statistics endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub notifications: DispatcherStatsSnapshot,
    pub store: StoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisStats>,
}

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct RedisStats {
    pub status: String,
    pub connected: bool,
    pub circuit_breaker_state: String,
    pub circuit_breaker_failures: u32,
    pub reconnection_attempts: u32,
}

/// GET /healthz - the process is up
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// GET /readyz - the counter store answers
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let backend = state.counter_store.backend_type().as_str().to_string();

    match state.counter_store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready".to_string(),
                store: backend,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, store = %backend, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "unavailable".to_string(),
                    store: backend,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let redis = state.redis_pool.as_ref().map(|pool| {
        let health = pool.health().stats();
        let circuit_breaker = pool.circuit_breaker().stats();
        RedisStats {
            status: health.status.as_str().to_string(),
            connected: health.status == crate::redis::RedisHealthStatus::Healthy,
            circuit_breaker_state: circuit_breaker.state.as_str().to_string(),
            circuit_breaker_failures: circuit_breaker.failure_count,
            reconnection_attempts: health.reconnection_attempts,
        }
    });

    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        notifications: state.dispatcher.stats(),
        store: StoreStats {
            backend: state.counter_store.backend_type().as_str().to_string(),
        },
        redis,
    })
}
