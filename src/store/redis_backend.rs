//! Redis-backed counter store.
//!
//! Every call is a single command (or a command followed by an expiry)
//! issued through the shared [`RedisPool`], so the circuit breaker sees all
//! traffic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::config::StoreBackendType;
use crate::metrics::StoreMetrics;
use crate::redis::RedisPool;

use super::{CounterStore, StoreError};

pub struct RedisCounterStore {
    pool: Arc<RedisPool>,
}

impl RedisCounterStore {
    pub fn new(pool: Arc<RedisPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<RedisPool> {
        &self.pool
    }

    /// Drop a drained counter. The decrement already landed, so a failure
    /// here only leaves a zero key behind until its expiry.
    async fn reclaim(&self, key: &str) {
        let del_key = key.to_string();
        let result = self
            .pool
            .execute(move |mut conn| async move {
                let removed: i64 = conn.del(&del_key).await?;
                Ok(removed)
            })
            .await;

        if let Err(e) = result {
            StoreMetrics::record_error("redis", "del");
            tracing::warn!(key, error = %e, "Failed to delete drained counter");
        }
    }

    fn record(operation: &'static str) -> impl FnOnce(crate::redis::PoolError) -> StoreError {
        move |e| {
            StoreMetrics::record_error("redis", operation);
            tracing::warn!(operation, error = %e, "Redis counter store operation failed");
            StoreError::Redis(e)
        }
    }
}

/// INCR/DECR against a non-integer value
fn is_not_integer(e: &redis::RedisError) -> bool {
    e.kind() == redis::ErrorKind::ResponseError && e.to_string().contains("not an integer")
}

/// Milliseconds for PEXPIRE / PX, never below 1.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn backend_type(&self) -> StoreBackendType {
        StoreBackendType::Redis
    }

    #[tracing::instrument(skip(self), level = "trace")]
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let incr_key = key.to_string();
        let result = self
            .pool
            .execute(move |mut conn| async move {
                let count: i64 = conn.incr(&incr_key, 1i64).await?;
                Ok(count)
            })
            .await;

        match result {
            Ok(_) => {}
            Err(crate::redis::PoolError::Redis(e)) if is_not_integer(&e) => {
                StoreMetrics::record_error("redis", "incr");
                return Err(StoreError::NotAnInteger {
                    key: key.to_string(),
                });
            }
            Err(e) => return Err(Self::record("incr")(e)),
        }

        let expire_key = key.to_string();
        let millis = ttl_millis(ttl) as i64;
        self.pool
            .execute(move |mut conn| async move {
                let applied: bool = conn.pexpire(&expire_key, millis).await?;
                Ok(applied)
            })
            .await
            .map_err(Self::record("pexpire"))?;

        Ok(())
    }

    #[tracing::instrument(skip(self), level = "trace")]
    async fn decr(&self, key: &str) -> Result<(), StoreError> {
        let decr_key = key.to_string();
        let remaining = self
            .pool
            .execute(move |mut conn| async move {
                let remaining: i64 = conn.decr(&decr_key, 1i64).await?;
                Ok(remaining)
            })
            .await
            .map_err(Self::record("decr"))?;

        if remaining <= 0 {
            self.reclaim(key).await;
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.pool
            .execute(move |mut conn| async move {
                let value: Option<String> = conn.get(&key).await?;
                Ok(value)
            })
            .await
            .map_err(Self::record("get"))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        let millis = ttl_millis(ttl);
        self.pool
            .execute(move |mut conn| async move {
                let _: () = conn.pset_ex(&key, &value, millis).await?;
                Ok(())
            })
            .await
            .map_err(Self::record("set"))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.pool.ping().await.map_err(Self::record("ping"))
    }
}
