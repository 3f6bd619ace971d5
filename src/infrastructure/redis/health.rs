//! Redis connection health tracking

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use crate::metrics::REDIS_CONNECTION_STATUS;

use super::current_time_ms;

/// Connection state of the counter store's Redis link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisHealthStatus {
    /// Last command reached Redis
    Healthy,
    /// No usable connection yet, or the last one dropped
    Reconnecting,
    /// Circuit breaker is open, not attempting connections
    CircuitOpen,
}

impl RedisHealthStatus {
    /// Label used in `/stats` output
    pub fn as_str(&self) -> &'static str {
        match self {
            RedisHealthStatus::Healthy => "healthy",
            RedisHealthStatus::Reconnecting => "reconnecting",
            RedisHealthStatus::CircuitOpen => "circuit_open",
        }
    }
}

/// Lock-free health tracker shared by the pool and `/stats`
pub struct RedisHealth {
    status: AtomicU8,
    last_connected: AtomicI64,
    reconnection_attempts: AtomicU32,
}

impl RedisHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(RedisHealthStatus::Reconnecting as u8),
            last_connected: AtomicI64::new(0),
            reconnection_attempts: AtomicU32::new(0),
        }
    }

    /// Record a working connection and clear the attempt counter
    pub fn set_connected(&self) {
        self.store(RedisHealthStatus::Healthy);
        self.last_connected.store(current_time_ms(), Ordering::Release);
        self.reconnection_attempts.store(0, Ordering::Release);
    }

    /// Record a dropped connection; counts one attempt
    pub fn set_reconnecting(&self) {
        self.store(RedisHealthStatus::Reconnecting);
        self.reconnection_attempts.fetch_add(1, Ordering::AcqRel);
    }

    /// Record that the circuit breaker is rejecting calls
    pub fn set_circuit_open(&self) {
        self.store(RedisHealthStatus::CircuitOpen);
    }

    // Also mirrors the status into the connection gauge
    fn store(&self, status: RedisHealthStatus) {
        self.status.store(status as u8, Ordering::Release);
        REDIS_CONNECTION_STATUS.set(i64::from(status == RedisHealthStatus::Healthy));
    }

    /// Current status
    pub fn status(&self) -> RedisHealthStatus {
        match self.status.load(Ordering::Acquire) {
            0 => RedisHealthStatus::Healthy,
            2 => RedisHealthStatus::CircuitOpen,
            _ => RedisHealthStatus::Reconnecting,
        }
    }

    /// Whether the last command reached Redis
    pub fn is_healthy(&self) -> bool {
        self.status() == RedisHealthStatus::Healthy
    }

    /// Point-in-time snapshot for `/stats`
    pub fn stats(&self) -> RedisHealthStats {
        RedisHealthStats {
            status: self.status(),
            last_connected_ms: self.last_connected.load(Ordering::Acquire),
            reconnection_attempts: self.reconnection_attempts.load(Ordering::Acquire),
        }
    }
}

impl Default for RedisHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Redis health snapshot
#[derive(Debug, Clone)]
pub struct RedisHealthStats {
    pub status: RedisHealthStatus,
    /// Unix millis of the last successful connect, 0 if never
    pub last_connected_ms: i64,
    /// Attempts since the last successful connect
    pub reconnection_attempts: u32,
}
