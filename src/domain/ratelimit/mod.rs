//! Per-recipient, per-category rate limiting for notification sends.
//!
//! Rules come from a [`RuleDirectory`] and counters live in a
//! [`CounterStore`](crate::store::CounterStore), so limits hold across every
//! instance sharing the store.

mod config;
mod limiter;

pub use config::{RateLimitRule, RateLimitRules, RuleDirectory};
pub use limiter::{RateLimitError, RateLimitLock, RateLimiter};
