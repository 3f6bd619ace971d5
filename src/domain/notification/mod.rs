//! Notification domain module.
//!
//! - `types`: requests and categories
//! - `dispatcher`: the send orchestration and its error model

mod dispatcher;
mod types;

pub use dispatcher::{
    DispatcherStats, DispatcherStatsSnapshot, NotificationDispatcher, SendError, SendErrorKind,
};
pub use types::{CategoryError, NotificationCategory, NotificationRequest};
