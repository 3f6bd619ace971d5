//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: HTTP-facing error type
//! - `metrics`: Prometheus metrics helpers
//! - `redis`: Redis connection pool, circuit breaker, and health checks

pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;
