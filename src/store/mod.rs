//! Counter store: the shared key/value state behind rate limiting and
//! idempotency.
//!
//! Two backends implement [`CounterStore`]:
//!
//! - `MemoryCounterStore`: process-local `DashMap` with lazy expiry (default)
//! - `RedisCounterStore`: shared Redis keys, for multi-instance deployments
//!
//! Use [`create_counter_store`] to pick one from configuration.

mod memory_backend;
mod redis_backend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{StoreBackendType, StoreConfig};
use crate::redis::{PoolError, RedisPool};

pub use memory_backend::MemoryCounterStore;
pub use redis_backend::RedisCounterStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis store error: {0}")]
    Redis(#[from] PoolError),

    /// Increment or decrement hit a value that is not an integer
    #[error("value at key '{key}' is not an integer")]
    NotAnInteger { key: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store with the atomic counter primitives the rate limiter and
/// idempotency guard are built on.
///
/// Each method is atomic on its own; no method spans more than one key and
/// callers never get multi-command transactions.
#[async_trait]
pub trait CounterStore: Send + Sync {
    fn backend_type(&self) -> StoreBackendType;

    /// Add one to the counter at `key` (absent counts as 0) and (re)apply
    /// `ttl` as its expiry.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Subtract one from the counter at `key`, deleting the key once the
    /// result is zero or below.
    async fn decr(&self, key: &str) -> Result<(), StoreError>;

    /// Raw value at `key`; `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite `key` with `value`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Cheap round trip used by readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Create a counter store based on configuration.
///
/// A Redis backend requested without a pool falls back to memory.
pub fn create_counter_store(
    settings: &StoreConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn CounterStore> {
    match settings.backend {
        StoreBackendType::Redis => {
            if let Some(pool) = redis_pool {
                tracing::info!(backend = "redis", url = %pool.url(), "Creating Redis counter store");
                Arc::new(RedisCounterStore::new(pool))
            } else {
                tracing::warn!(
                    "Redis counter store requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryCounterStore::new())
            }
        }
        StoreBackendType::Memory => {
            tracing::info!(backend = "memory", "Creating memory counter store");
            Arc::new(MemoryCounterStore::new())
        }
    }
}
