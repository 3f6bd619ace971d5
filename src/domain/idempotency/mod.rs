//! Idempotency guard keyed by correlation id.
//!
//! A marker is written once a request has been delivered. Its presence means
//! the request must not be delivered again; its absence means "not yet
//! processed, or the marker expired".

use std::sync::Arc;
use std::time::Duration;

use crate::store::{CounterStore, StoreError};

/// Value stored under a processed correlation id
pub const PROCESSED_MARKER: &str = "processed";

pub struct IdempotencyGuard {
    store: Arc<dyn CounterStore>,
    key_prefix: String,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn CounterStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn marker_key(&self, correlation_id: &str) -> String {
        format!("{}:{}", self.key_prefix, correlation_id)
    }

    /// Whether `correlation_id` has already been delivered. Read only.
    pub async fn is_processed(&self, correlation_id: &str) -> Result<bool, StoreError> {
        let value = self.store.get(&self.marker_key(correlation_id)).await?;
        Ok(value.is_some_and(|v| !v.is_empty()))
    }

    /// Record `correlation_id` as delivered for `ttl`.
    pub async fn mark_processed(
        &self,
        correlation_id: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.store
            .set(&self.marker_key(correlation_id), PROCESSED_MARKER, ttl)
            .await
    }
}
