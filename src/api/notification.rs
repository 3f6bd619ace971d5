//! Notification send endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::notification::{NotificationCategory, NotificationRequest};
use crate::server::AppState;

/// Body of POST /api/v1/notifications/send.
///
/// Fields default to empty so that every missing field can be reported in
/// one response.
#[derive(Debug, Default, Deserialize)]
pub struct SendNotificationRequest {
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub user_id: String,
    /// Notification category name, e.g. "status"
    #[serde(default, rename = "type")]
    pub notification_type: String,
    #[serde(default)]
    pub message: String,
}

impl SendNotificationRequest {
    /// Every required field that is missing or blank
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("correlation_id", &self.correlation_id),
            ("user_id", &self.user_id),
            ("type", &self.notification_type),
            ("message", &self.message),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    pub success: bool,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Send one notification to one user
#[tracing::instrument(
    name = "api.send_notification",
    skip(state, request),
    fields(
        correlation_id = %request.correlation_id,
        recipient_id = %request.user_id,
        category = %request.notification_type
    )
)]
pub async fn send_notification(
    State(state): State<AppState>,
    Json(request): Json<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        let problems: Vec<String> = missing
            .iter()
            .map(|field| format!("{field} is required"))
            .collect();
        return Err(AppError::Validation(problems.join("; ")));
    }

    let category = NotificationCategory::from_name(&request.notification_type);
    if !state.dispatcher.limiter().rules().contains(&category) {
        return Err(AppError::Validation(format!(
            "unknown notification type '{}'",
            request.notification_type
        )));
    }

    let notification = NotificationRequest::new(
        request.correlation_id,
        request.user_id,
        category,
        request.message,
    );

    state.dispatcher.send(&notification).await?;

    Ok(Json(SendNotificationResponse {
        success: true,
        correlation_id: notification.correlation_id,
        timestamp: Utc::now(),
    }))
}
