//! Circuit breaker guarding Redis counter store calls

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use crate::config::RedisConfig;
use crate::metrics::REDIS_CIRCUIT_BREAKER_STATE;

use super::current_time_ms;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow through
    Closed = 0,
    /// Calls are rejected without touching Redis
    Open = 1,
    /// Probe calls are let through to test recovery
    HalfOpen = 2,
}

impl CircuitState {
    fn from_raw(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Consecutive half-open successes before closing
    pub success_threshold: u32,
    /// Time spent open before probing again (ms)
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout_ms: 30_000,
        }
    }
}

impl From<&RedisConfig> for CircuitBreakerConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            failure_threshold: config.circuit_breaker_failure_threshold.max(1),
            success_threshold: config.circuit_breaker_success_threshold.max(1),
            reset_timeout_ms: config.circuit_breaker_reset_timeout_seconds * 1000,
        }
    }
}

/// Lock-free circuit breaker shared by every Redis caller.
pub struct CircuitBreaker {
    state: AtomicU8,
    failures: AtomicU32,
    successes: AtomicU32,
    opened_at_ms: AtomicI64,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            failures: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            opened_at_ms: AtomicI64::new(0),
            config,
        }
    }

    /// Current state; an expired open circuit moves to half-open here.
    pub fn state(&self) -> CircuitState {
        let raw = CircuitState::from_raw(self.state.load(Ordering::Acquire));
        if raw != CircuitState::Open {
            return raw;
        }

        let elapsed = current_time_ms() - self.opened_at_ms.load(Ordering::Acquire);
        if elapsed < self.config.reset_timeout_ms as i64 {
            return CircuitState::Open;
        }

        if self
            .state
            .compare_exchange(
                CircuitState::Open as u8,
                CircuitState::HalfOpen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.successes.store(0, Ordering::Release);
            REDIS_CIRCUIT_BREAKER_STATE.set(CircuitState::HalfOpen as i64);
            tracing::info!("Redis circuit breaker half-open, probing");
        }
        CircuitState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn allow_request(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn record_success(&self) {
        match CircuitState::from_raw(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => self.failures.store(0, Ordering::Release),
            CircuitState::HalfOpen => {
                let successes = self.successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.transition_to(CircuitState::Closed);
                    tracing::info!("Redis circuit breaker closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match CircuitState::from_raw(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to(CircuitState::Open);
                    tracing::warn!(failures, "Redis circuit breaker opened");
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open);
                tracing::warn!("Redis circuit breaker reopened by failed probe");
            }
            CircuitState::Open => {
                self.opened_at_ms.store(current_time_ms(), Ordering::Release);
            }
        }
    }

    fn transition_to(&self, state: CircuitState) {
        self.state.store(state as u8, Ordering::Release);
        self.successes.store(0, Ordering::Release);
        match state {
            CircuitState::Open => self.opened_at_ms.store(current_time_ms(), Ordering::Release),
            CircuitState::Closed => self.failures.store(0, Ordering::Release),
            CircuitState::HalfOpen => {}
        }
        REDIS_CIRCUIT_BREAKER_STATE.set(state as i64);
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            failure_count: self.failures.load(Ordering::Acquire),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
}
