//! Send pipeline integration tests
//!
//! These tests drive `NotificationDispatcher::send` through the public API
//! using the in-memory counter store, the in-memory user directory and
//! scripted transports. No Redis or SMTP server is needed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ara_mail_notifier::config::{RuleConfig, Settings, StoreBackendType};
use ara_mail_notifier::domain::identity::{
    DirectoryError, IdentityDirectory, MemoryUserDirectory, User,
};
use ara_mail_notifier::notification::{
    NotificationCategory, NotificationDispatcher, NotificationRequest, SendError, SendErrorKind,
};
use ara_mail_notifier::server::build_dispatcher;
use ara_mail_notifier::store::{CounterStore, MemoryCounterStore, StoreError};
use ara_mail_notifier::transport::{MailTransport, TransportError};

// ============================================================================
// Test doubles
// ============================================================================

/// Transport that records deliveries and fails on demand
#[derive(Default)]
struct ScriptedTransport {
    fail: AtomicBool,
    sent: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedTransport {
    fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        transport
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn deliver(&self, address: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Delivery("connection refused".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Memory store that counts calls and can fail individual operations
#[derive(Default)]
struct InstrumentedStore {
    inner: MemoryCounterStore,
    gets: AtomicUsize,
    incrs: AtomicUsize,
    decrs: AtomicUsize,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_decr: AtomicBool,
}

impl InstrumentedStore {
    fn unavailable() -> StoreError {
        StoreError::Unavailable("injected failure".to_string())
    }
}

#[async_trait]
impl CounterStore for InstrumentedStore {
    fn backend_type(&self) -> StoreBackendType {
        StoreBackendType::Memory
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.incrs.fetch_add(1, Ordering::SeqCst);
        self.inner.incr_with_expiry(key, ttl).await
    }

    async fn decr(&self, key: &str) -> Result<(), StoreError> {
        self.decrs.fetch_add(1, Ordering::SeqCst);
        if self.fail_decr.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.decr(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.set(key, value, ttl).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// Directory wrapper that counts lookups
struct CountingDirectory {
    inner: MemoryUserDirectory,
    lookups: AtomicUsize,
}

#[async_trait]
impl IdentityDirectory for CountingDirectory {
    async fn resolve(&self, recipient_id: &str) -> Result<String, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(recipient_id).await
    }
}

struct TestEnvironment {
    dispatcher: NotificationDispatcher,
    store: Arc<InstrumentedStore>,
    directory: Arc<CountingDirectory>,
    transport: Arc<ScriptedTransport>,
}

fn users() -> Vec<User> {
    vec![
        User {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
        },
        User {
            id: "u2".to_string(),
            name: "Alan".to_string(),
            last_name: "Turing".to_string(),
            email: "alan@example.com".to_string(),
        },
    ]
}

fn create_test_environment_with(settings: Settings, transport: ScriptedTransport) -> TestEnvironment {
    let store = Arc::new(InstrumentedStore::default());
    let directory = Arc::new(CountingDirectory {
        inner: MemoryUserDirectory::from_users(users()).unwrap(),
        lookups: AtomicUsize::new(0),
    });
    let transport = Arc::new(transport);

    let dispatcher = build_dispatcher(
        &settings,
        store.clone(),
        directory.clone(),
        transport.clone(),
    );

    TestEnvironment {
        dispatcher,
        store,
        directory,
        transport,
    }
}

/// Default settings: status 2/60s, news 1/24h, marketing 3/1h
fn create_test_environment() -> TestEnvironment {
    create_test_environment_with(Settings::default(), ScriptedTransport::default())
}

fn request(correlation_id: &str, recipient: &str, category: NotificationCategory) -> NotificationRequest {
    NotificationRequest::new(correlation_id, recipient, category, "hi")
}

async fn counter(env: &TestEnvironment, recipient: &str, category: &NotificationCategory) -> u64 {
    env.dispatcher
        .limiter()
        .current_count(recipient, category)
        .await
        .unwrap()
}

// ============================================================================
// Rate limiting
// ============================================================================

mod rate_limit_tests {
    use super::*;

    #[tokio::test]
    async fn test_status_rule_admits_two_then_limits() {
        let env = create_test_environment();

        env.dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await
            .unwrap();
        env.dispatcher
            .send(&request("id-2", "u1", NotificationCategory::Status))
            .await
            .unwrap();

        let third = env
            .dispatcher
            .send(&request("id-3", "u1", NotificationCategory::Status))
            .await;
        match third {
            Err(SendError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(60));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }

        assert_eq!(env.transport.sent_count(), 2);
        assert_eq!(counter(&env, "u1", &NotificationCategory::Status).await, 2);
    }

    #[tokio::test]
    async fn test_news_rule_hint_is_full_window() {
        let env = create_test_environment();

        env.dispatcher
            .send(&request("id-1", "u1", NotificationCategory::News))
            .await
            .unwrap();
        let second = env
            .dispatcher
            .send(&request("id-2", "u1", NotificationCategory::News))
            .await
            .unwrap_err();

        assert_eq!(second.kind(), SendErrorKind::RateLimited);
        assert_eq!(second.retry_after(), Some(Duration::from_secs(86_400)));
    }

    #[tokio::test]
    async fn test_limits_are_per_recipient_and_category() {
        let env = create_test_environment();

        for (id, recipient, category) in [
            ("id-1", "u1", NotificationCategory::News),
            ("id-2", "u2", NotificationCategory::News),
            ("id-3", "u1", NotificationCategory::Status),
        ] {
            env.dispatcher
                .send(&request(id, recipient, category))
                .await
                .unwrap();
        }

        assert_eq!(env.transport.sent_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_category_is_denied_without_wait() {
        let env = create_test_environment();

        let result = env
            .dispatcher
            .send(&request("id-1", "u1", NotificationCategory::from_name("digest")))
            .await
            .unwrap_err();

        assert_eq!(result.retry_after(), Some(Duration::ZERO));
        assert_eq!(env.store.incrs.load(Ordering::SeqCst), 0);
        assert_eq!(env.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_configured_category_uses_its_rule() {
        let mut settings = Settings::default();
        settings.rate_limit.rules.insert(
            "digest".to_string(),
            RuleConfig {
                max_count: 1,
                window_seconds: 300,
            },
        );
        let env = create_test_environment_with(settings, ScriptedTransport::default());
        let digest = NotificationCategory::from_name("digest");

        env.dispatcher
            .send(&request("id-1", "u1", digest.clone()))
            .await
            .unwrap();
        let second = env
            .dispatcher
            .send(&request("id-2", "u1", digest))
            .await
            .unwrap_err();

        assert_eq!(second.retry_after(), Some(Duration::from_secs(300)));
        assert_eq!(env.transport.sent()[0].1, "Notification");
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_restores_capacity() {
        let env = create_test_environment();

        for id in ["id-1", "id-2"] {
            env.dispatcher
                .send(&request(id, "u1", NotificationCategory::Status))
                .await
                .unwrap();
        }
        assert!(env
            .dispatcher
            .send(&request("id-3", "u1", NotificationCategory::Status))
            .await
            .is_err());

        tokio::time::advance(Duration::from_secs(61)).await;

        env.dispatcher
            .send(&request("id-4", "u1", NotificationCategory::Status))
            .await
            .unwrap();
        assert_eq!(counter(&env, "u1", &NotificationCategory::Status).await, 1);
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_internal_and_untouched() {
        let env = create_test_environment();
        env.store
            .set("ara:ratelimit:u1:status", "abc", Duration::from_secs(60))
            .await
            .unwrap();

        let err = env
            .dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SendErrorKind::Internal);
        assert!(!err.delivered());
        assert_eq!(env.transport.sent_count(), 0);
        assert_eq!(
            env.store.get("ara:ratelimit:u1:status").await.unwrap().as_deref(),
            Some("abc")
        );
    }
}

// ============================================================================
// Idempotency
// ============================================================================

mod idempotency_tests {
    use super::*;

    #[tokio::test]
    async fn test_same_correlation_id_delivers_once() {
        let env = create_test_environment();
        let first = request("id-1", "u1", NotificationCategory::Status);

        env.dispatcher.send(&first).await.unwrap();
        let second = env.dispatcher.send(&first).await.unwrap_err();

        assert!(matches!(
            second,
            SendError::Duplicate { ref correlation_id } if correlation_id == "id-1"
        ));
        assert_eq!(env.transport.sent_count(), 1);
        assert_eq!(env.store.incrs.load(Ordering::SeqCst), 1);
        assert_eq!(counter(&env, "u1", &NotificationCategory::Status).await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_touches_no_other_collaborator() {
        let env = create_test_environment();
        env.store
            .set("ara:idempotency:id-9", "processed", Duration::from_secs(60))
            .await
            .unwrap();

        let err = env
            .dispatcher
            .send(&request("id-9", "u1", NotificationCategory::Status))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SendErrorKind::Duplicate);
        assert_eq!(env.directory.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(env.store.incrs.load(Ordering::SeqCst), 0);
        assert_eq!(env.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_marker_written_after_delivery() {
        let env = create_test_environment();

        env.dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Marketing))
            .await
            .unwrap();

        assert_eq!(
            env.store.get("ara:idempotency:id-1").await.unwrap().as_deref(),
            Some("processed")
        );
    }

    #[tokio::test]
    async fn test_failed_delivery_leaves_no_marker() {
        let env = create_test_environment_with(Settings::default(), ScriptedTransport::failing());

        let _ = env
            .dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await;

        assert_eq!(env.store.get("ara:idempotency:id-1").await.unwrap(), None);

        // The same id can be retried once the transport recovers
        env.transport.set_failing(false);
        env.dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await
            .unwrap();
        assert_eq!(env.transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_marker_write_failure_reports_delivered() {
        let env = create_test_environment();
        env.store.fail_set.store(true, Ordering::SeqCst);

        let err = env
            .dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SendErrorKind::Internal);
        assert!(err.delivered());
        assert_eq!(env.transport.sent_count(), 1);
        // Admission is kept: the message did go out
        assert_eq!(counter(&env, "u1", &NotificationCategory::Status).await, 1);
    }

    #[tokio::test]
    async fn test_idempotency_read_failure_is_internal() {
        let env = create_test_environment();
        env.store.fail_get.store(true, Ordering::SeqCst);

        let err = env
            .dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SendErrorKind::Internal);
        assert_eq!(env.directory.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(env.transport.sent_count(), 0);
    }
}

// ============================================================================
// Recipient and delivery failures
// ============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_recipient_skips_limiter_and_transport() {
        let env = create_test_environment();

        let err = env
            .dispatcher
            .send(&request("id-1", "ghost", NotificationCategory::Status))
            .await
            .unwrap_err();

        assert!(matches!(err, SendError::InvalidRecipient(ref id) if id == "ghost"));
        // Only the idempotency check read the store
        assert_eq!(env.store.gets.load(Ordering::SeqCst), 1);
        assert_eq!(env.store.incrs.load(Ordering::SeqCst), 0);
        assert_eq!(env.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_rolls_back_admission() {
        let env = create_test_environment_with(Settings::default(), ScriptedTransport::failing());

        let err = env
            .dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SendErrorKind::DeliveryFailed);
        assert_eq!(env.store.decrs.load(Ordering::SeqCst), 1);
        assert_eq!(counter(&env, "u1", &NotificationCategory::Status).await, 0);
    }

    #[tokio::test]
    async fn test_failed_deliveries_never_consume_quota() {
        let env = create_test_environment_with(Settings::default(), ScriptedTransport::failing());

        for i in 0..5 {
            let err = env
                .dispatcher
                .send(&request(&format!("fail-{i}"), "u1", NotificationCategory::Status))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), SendErrorKind::DeliveryFailed);
        }

        env.transport.set_failing(false);
        for id in ["ok-1", "ok-2"] {
            env.dispatcher
                .send(&request(id, "u1", NotificationCategory::Status))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_rollback_failure_still_reports_delivery_failure() {
        let env = create_test_environment_with(Settings::default(), ScriptedTransport::failing());
        env.store.fail_decr.store(true, Ordering::SeqCst);

        let err = env
            .dispatcher
            .send(&request("id-1", "u1", NotificationCategory::Status))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SendErrorKind::DeliveryFailed);
        assert_eq!(env.dispatcher.stats().rollback_failures, 1);
        // The admission could not be undone
        assert_eq!(counter(&env, "u1", &NotificationCategory::Status).await, 1);
    }

    #[tokio::test]
    async fn test_message_composition() {
        let env = create_test_environment();

        env.dispatcher
            .send(&NotificationRequest::new(
                "id-1",
                "u2",
                NotificationCategory::Marketing,
                "50% off",
            ))
            .await
            .unwrap();

        assert_eq!(
            env.transport.sent(),
            vec![(
                "alan@example.com".to_string(),
                "Special Offers".to_string(),
                "50% off".to_string()
            )]
        );
    }
}

// ============================================================================
// Statistics and concurrency
// ============================================================================

mod stats_tests {
    use super::*;

    #[tokio::test]
    async fn test_each_call_counts_one_outcome() {
        let env = create_test_environment();

        let _ = env.dispatcher.send(&request("id-1", "u1", NotificationCategory::News)).await;
        let _ = env.dispatcher.send(&request("id-1", "u1", NotificationCategory::News)).await;
        let _ = env.dispatcher.send(&request("id-2", "u1", NotificationCategory::News)).await;
        let _ = env.dispatcher.send(&request("id-3", "ghost", NotificationCategory::News)).await;

        let stats = env.dispatcher.stats();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.invalid_recipients, 1);
    }

    #[tokio::test]
    async fn test_concurrent_burst_admission_is_bounded_by_burst_size() {
        let env = create_test_environment();

        let requests: Vec<_> = (0..10)
            .map(|i| request(&format!("burst-{i}"), "u1", NotificationCategory::Marketing))
            .collect();
        let results = futures::future::join_all(requests.iter().map(|r| env.dispatcher.send(r))).await;

        // Read-then-increment may over-admit under contention; every admission is counted
        let delivered = results.iter().filter(|r| r.is_ok()).count();
        assert!(delivered >= 3);
        assert!(delivered <= requests.len());
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == SendErrorKind::RateLimited));
        assert_eq!(env.transport.sent_count(), delivered);
        assert_eq!(
            counter(&env, "u1", &NotificationCategory::Marketing).await,
            delivered as u64
        );
    }
}
