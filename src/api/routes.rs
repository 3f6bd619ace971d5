use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::health::{healthz, readyz, stats};
use super::metrics::prometheus_metrics;
use super::notification::send_notification;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Probes & Stats
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Notification endpoints
        .nest(
            "/api/v1",
            Router::new()
                .route("/notifications/send", post(send_notification))
                .route_layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
