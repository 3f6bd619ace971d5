//! Counter-based rate limiter with compensating release.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::domain::notification::NotificationCategory;
use crate::metrics::RateLimitMetrics;
use crate::store::{CounterStore, StoreError};

use super::config::RuleDirectory;

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// No capacity left in the current window
    #[error("rate limit exceeded, retry after {}s", retry_after.as_secs())]
    Exceeded { retry_after: Duration },

    #[error("rate limit store error: {0}")]
    Store(#[from] StoreError),

    /// The stored counter is not a number; it is reported, never reset
    #[error("corrupt rate limit counter at '{key}': {value:?}")]
    CorruptCounter { key: String, value: String },
}

/// Per-subject, per-category admission control on top of a [`CounterStore`].
///
/// Admission reads the counter and then increments it. The two steps are
/// not exclusive, so concurrent first requests on one key can briefly admit
/// more than `max_count`.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    rules: Arc<dyn RuleDirectory>,
    key_prefix: String,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        rules: Arc<dyn RuleDirectory>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            rules,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn rules(&self) -> &Arc<dyn RuleDirectory> {
        &self.rules
    }

    pub fn counter_key(&self, subject: &str, category: &NotificationCategory) -> String {
        format!("{}:{}:{}", self.key_prefix, subject, category)
    }

    /// Admissions currently counted for `(subject, category)`.
    pub async fn current_count(
        &self,
        subject: &str,
        category: &NotificationCategory,
    ) -> Result<u64, RateLimitError> {
        let key = self.counter_key(subject, category);
        self.read_counter(&key).await
    }

    async fn read_counter(&self, key: &str) -> Result<u64, RateLimitError> {
        let raw = match self.store.get(key).await? {
            Some(raw) => raw,
            None => return Ok(0),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }

        // A counter caught between DECR and DEL may read negative
        trimmed
            .parse::<i64>()
            .map(|count| count.max(0) as u64)
            .map_err(|_| RateLimitError::CorruptCounter {
                key: key.to_string(),
                value: raw.clone(),
            })
    }

    /// Admit one send for `(subject, category)` if the window has room.
    ///
    /// On success the counter has been incremented and the returned lock can
    /// undo that increment. A denial leaves the store untouched.
    #[tracing::instrument(
        name = "ratelimit.acquire",
        skip(self, category),
        fields(category = %category)
    )]
    pub async fn acquire_if_available(
        &self,
        subject: &str,
        category: &NotificationCategory,
    ) -> Result<RateLimitLock, RateLimitError> {
        let key = self.counter_key(subject, category);
        let rule = self.rules.rule_for(category);

        let count = self.read_counter(&key).await?;
        if count >= u64::from(rule.max_count) {
            RateLimitMetrics::record_denied(category.as_str());
            tracing::debug!(
                key = %key,
                count,
                max_count = rule.max_count,
                "Rate limit exceeded"
            );
            return Err(RateLimitError::Exceeded {
                retry_after: rule.window,
            });
        }

        self.store.incr_with_expiry(&key, rule.window).await?;
        RateLimitMetrics::record_allowed(category.as_str());

        Ok(RateLimitLock {
            store: Arc::clone(&self.store),
            key,
        })
    }
}

/// One granted admission.
///
/// Dropping the lock keeps the admission; `release` gives it back.
#[must_use = "dropping a RateLimitLock keeps the admission; call release() to undo it"]
pub struct RateLimitLock {
    store: Arc<dyn CounterStore>,
    key: String,
}

impl RateLimitLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Undo the admission with a single decrement.
    pub async fn release(self) -> Result<(), StoreError> {
        match self.store.decr(&self.key).await {
            Ok(()) => {
                RateLimitMetrics::record_rollback();
                Ok(())
            }
            Err(e) => {
                RateLimitMetrics::record_rollback_failure();
                Err(e)
            }
        }
    }
}

impl fmt::Debug for RateLimitLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitLock")
            .field("key", &self.key)
            .field("backend", &self.store.backend_type().as_str())
            .finish()
    }
}
