//! Notification request and category types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("invalid notification category: '{0}'")]
    InvalidCategory(String),
}

/// Category of a notification.
///
/// Partitions rate limit counters and selects the mail subject. Categories
/// added through configuration land in `Other`, always with a lowercase name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum NotificationCategory {
    Status,
    News,
    Marketing,
    Other(String),
}

impl NotificationCategory {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationCategory::Status => "status",
            NotificationCategory::News => "news",
            NotificationCategory::Marketing => "marketing",
            NotificationCategory::Other(name) => name,
        }
    }

    /// Lenient parse: unknown names become `Other`.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "status" => NotificationCategory::Status,
            "news" => NotificationCategory::News,
            "marketing" => NotificationCategory::Marketing,
            _ => NotificationCategory::Other(normalized),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, NotificationCategory::Other(_))
    }

    /// Mail subject line for this category
    pub fn subject(&self) -> &'static str {
        match self {
            NotificationCategory::Status => "Status Update",
            NotificationCategory::News => "Product News",
            NotificationCategory::Marketing => "Special Offers",
            NotificationCategory::Other(_) => "Notification",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse: only the built-in categories are accepted.
impl FromStr for NotificationCategory {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_name(s) {
            NotificationCategory::Other(_) => Err(CategoryError::InvalidCategory(s.to_string())),
            category => Ok(category),
        }
    }
}

impl From<String> for NotificationCategory {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<NotificationCategory> for String {
    fn from(category: NotificationCategory) -> Self {
        match category {
            NotificationCategory::Other(name) => name,
            builtin => builtin.as_str().to_string(),
        }
    }
}

/// One logical send request.
///
/// `correlation_id` is the idempotency key: two requests with the same id
/// are the same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub correlation_id: String,
    pub recipient_id: String,
    pub category: NotificationCategory,
    pub body: String,
}

impl NotificationRequest {
    pub fn new(
        correlation_id: impl Into<String>,
        recipient_id: impl Into<String>,
        category: NotificationCategory,
        body: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            recipient_id: recipient_id.into(),
            category,
            body: body.into(),
        }
    }
}
