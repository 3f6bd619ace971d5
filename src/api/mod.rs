//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod notification;
mod routes;

pub use health::{healthz, readyz, stats};
pub use metrics::prometheus_metrics;
pub use notification::{send_notification, SendNotificationRequest, SendNotificationResponse};
pub use routes::api_routes;
