//! Redis connectivity for the shared counter store.
//!
//! - `CircuitBreaker`: stops hammering Redis while it is unavailable
//! - `RedisHealth`: tracks connection health status
//! - `pool`: multiplexed connection used by the Redis counter store

mod circuit_breaker;
mod health;
pub mod pool;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use health::{RedisHealth, RedisHealthStats, RedisHealthStatus};
pub use pool::{PoolError, RedisPool};

/// Get current time in milliseconds since epoch
pub(crate) fn current_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
