//! Redis connection pool for the counter store.
//!
//! Holds a single multiplexed connection shared by every task and routes
//! each command through the circuit breaker.

use std::future::Future;
use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RedisHealth};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: Arc<CircuitBreaker>,
    health: Arc<RedisHealth>,
    config: RedisConfig,
}

impl RedisPool {
    /// Create a pool; no connection is opened until the first command.
    pub fn new(
        config: RedisConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        health: Arc<RedisHealth>,
    ) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker,
            health,
            config,
        })
    }

    /// Create a pool with its own breaker and health tracker built from `config`.
    pub fn from_config(config: RedisConfig) -> Result<Self, PoolError> {
        let circuit_breaker = Arc::new(CircuitBreaker::with_config(CircuitBreakerConfig::from(
            &config,
        )));
        Self::new(config, circuit_breaker, Arc::new(RedisHealth::new()))
    }

    /// Get the shared connection, connecting first if needed.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            self.health.set_circuit_open();
            return Err(PoolError::CircuitOpen);
        }

        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        self.health.set_reconnecting();

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                self.circuit_breaker.record_success();
                self.health.set_connected();
                tracing::info!(url = %self.config.url, "Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run one command with circuit breaker bookkeeping.
    ///
    /// A dropped or broken connection is discarded so the next call reconnects.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                    self.health.set_reconnecting();
                }
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy() && self.circuit_breaker.state() == CircuitState::Closed
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    pub fn health(&self) -> &Arc<RedisHealth> {
        &self.health
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(pong)
        })
        .await
        .map(|_| ())
    }
}
