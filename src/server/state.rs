use std::sync::Arc;
use std::time::Instant;

use crate::config::{Settings, StoreBackendType};
use crate::domain::idempotency::IdempotencyGuard;
use crate::domain::identity::{IdentityDirectory, MemoryUserDirectory};
use crate::domain::ratelimit::{RateLimitRules, RateLimiter};
use crate::error::{AppError, Result};
use crate::notification::NotificationDispatcher;
use crate::redis::RedisPool;
use crate::store::{create_counter_store, CounterStore};
use crate::transport::{create_mail_transport, MailTransport};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub counter_store: Arc<dyn CounterStore>,
    pub redis_pool: Option<Arc<RedisPool>>,
    pub start_time: Instant,
}

impl AppState {
    /// Build every component from configuration.
    pub fn new(settings: Settings) -> Result<Self> {
        let redis_pool = match settings.store.backend {
            StoreBackendType::Redis => match RedisPool::from_config(settings.redis.clone()) {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    tracing::warn!(error = %e, url = %settings.redis.url, "Invalid Redis configuration");
                    None
                }
            },
            StoreBackendType::Memory => None,
        };

        let counter_store = create_counter_store(&settings.store, redis_pool.clone());

        let directory = MemoryUserDirectory::from_seeds(&settings.users)
            .map_err(|e| AppError::Internal(format!("invalid user seed list: {e}")))?;
        tracing::info!(users = settings.users.len(), "Identity directory loaded");

        let transport = create_mail_transport(&settings.mail)
            .map_err(|e| AppError::Internal(format!("mail transport setup failed: {e}")))?;

        let dispatcher = build_dispatcher(
            &settings,
            counter_store.clone(),
            Arc::new(directory),
            transport,
        );

        Ok(Self::from_parts(
            settings,
            Arc::new(dispatcher),
            counter_store,
            redis_pool,
        ))
    }

    pub fn from_parts(
        settings: Settings,
        dispatcher: Arc<NotificationDispatcher>,
        counter_store: Arc<dyn CounterStore>,
        redis_pool: Option<Arc<RedisPool>>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            dispatcher,
            counter_store,
            redis_pool,
            start_time: Instant::now(),
        }
    }
}

/// Wire a dispatcher from configuration around the given collaborators.
pub fn build_dispatcher(
    settings: &Settings,
    counter_store: Arc<dyn CounterStore>,
    directory: Arc<dyn IdentityDirectory>,
    transport: Arc<dyn MailTransport>,
) -> NotificationDispatcher {
    let rules = RateLimitRules::from(&settings.rate_limit);
    let limiter = RateLimiter::new(
        counter_store.clone(),
        Arc::new(rules),
        settings.rate_limit.key_prefix.clone(),
    );
    let idempotency = IdempotencyGuard::new(counter_store, settings.idempotency.key_prefix.clone());

    NotificationDispatcher::new(
        idempotency,
        limiter,
        directory,
        transport,
        settings.idempotency.ttl(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserSeed;

    #[test]
    fn test_state_from_default_settings() {
        let state = AppState::new(Settings::default()).unwrap();
        assert_eq!(state.counter_store.backend_type(), StoreBackendType::Memory);
        assert!(state.redis_pool.is_none());
    }

    #[test]
    fn test_redis_backend_creates_pool() {
        let mut settings = Settings::default();
        settings.store.backend = StoreBackendType::Redis;

        let state = AppState::new(settings).unwrap();
        assert!(state.redis_pool.is_some());
        assert_eq!(state.counter_store.backend_type(), StoreBackendType::Redis);
    }

    #[test]
    fn test_duplicate_seed_fails_startup() {
        let seed = UserSeed {
            id: "u1".to_string(),
            name: String::new(),
            last_name: String::new(),
            email: "u1@example.com".to_string(),
        };
        let mut settings = Settings::default();
        settings.users = vec![seed.clone(), seed];

        assert!(matches!(AppState::new(settings), Err(AppError::Internal(_))));
    }
}
