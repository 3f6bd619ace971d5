use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::notification::{SendError, SendErrorKind};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

fn send_error_status(kind: SendErrorKind) -> StatusCode {
    match kind {
        SendErrorKind::Duplicate => StatusCode::CONFLICT,
        SendErrorKind::InvalidRecipient => StatusCode::BAD_REQUEST,
        SendErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        SendErrorKind::DeliveryFailed => StatusCode::BAD_GATEWAY,
        SendErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Whole seconds for the Retry-After header, rounding partial seconds up
fn retry_after_seconds(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, code, client_message, log_message) = match &self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Configuration error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Send(e) => {
                let kind = e.kind();
                retry_after = e.retry_after();
                let log_msg = e.to_string();
                let client_msg = if kind == SendErrorKind::Internal && is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (send_error_status(kind), kind.as_str(), client_msg, log_msg)
            }
            AppError::Internal(e) => {
                let log_msg = e.clone();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, log_msg)
            }
        };

        // Server errors are ours; client errors are only worth a warning
        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::warn!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        let mut response = (status, Json(body)).into_response();

        if let Some(wait) = retry_after {
            if let Ok(v) = HeaderValue::from_str(&retry_after_seconds(wait).to_string()) {
                response.headers_mut().insert("Retry-After", v);
            }
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
