//! HTTP API integration tests
//!
//! Requests go through the full axum `Router` (middleware included) with
//! `tower::ServiceExt::oneshot`; no socket is opened.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use ara_mail_notifier::config::{RuleConfig, Settings, UserSeed};
use ara_mail_notifier::domain::identity::MemoryUserDirectory;
use ara_mail_notifier::server::{build_dispatcher, create_app, AppState, API_KEY_HEADER};
use ara_mail_notifier::store::{CounterStore, MemoryCounterStore};
use ara_mail_notifier::transport::{MailTransport, TransportError};

#[derive(Default)]
struct SwitchTransport {
    fail: AtomicBool,
}

#[async_trait]
impl MailTransport for SwitchTransport {
    fn name(&self) -> &'static str {
        "switch"
    }

    async fn deliver(&self, _address: &str, _subject: &str, _body: &str) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(TransportError::Delivery("relay down".to_string()))
        } else {
            Ok(())
        }
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.users = vec![UserSeed {
        id: "u1".to_string(),
        name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
    }];
    settings
}

fn create_test_app_with(settings: Settings, transport: Arc<SwitchTransport>) -> Router {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let directory = Arc::new(MemoryUserDirectory::from_seeds(&settings.users).unwrap());
    let dispatcher = build_dispatcher(&settings, store.clone(), directory, transport);

    create_app(AppState::from_parts(settings, Arc::new(dispatcher), store, None))
}

fn create_test_app() -> Router {
    create_test_app_with(test_settings(), Arc::new(SwitchTransport::default()))
}

fn send_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/notifications/send")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn payload(correlation_id: &str, kind: &str) -> Value {
    json!({
        "correlation_id": correlation_id,
        "user_id": "u1",
        "type": kind,
        "message": "hello"
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

mod send_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_success() {
        let app = create_test_app();

        let response = app.oneshot(send_request(payload("id-1", "status"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["correlation_id"], "id-1");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let app = create_test_app();

        let first = app.clone().oneshot(send_request(payload("id-1", "news"))).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(send_request(payload("id-1", "news"))).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["error"]["code"], "DUPLICATE");
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let app = create_test_app();

        for id in ["id-1", "id-2"] {
            let response = app.clone().oneshot(send_request(payload(id, "status"))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(send_request(payload("id-3", "status"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "60");
        assert_eq!(body_json(response).await["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_unknown_user_is_bad_request() {
        let app = create_test_app();

        let mut body = payload("id-1", "status");
        body["user_id"] = json!("ghost");

        let response = app.oneshot(send_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_RECIPIENT");
    }

    #[tokio::test]
    async fn test_missing_fields_reported_together() {
        let app = create_test_app();

        let response = app
            .oneshot(send_request(json!({ "user_id": "u1", "message": "" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("correlation_id is required"));
        assert!(message.contains("type is required"));
        assert!(message.contains("message is required"));
    }

    #[tokio::test]
    async fn test_unknown_type_rejected() {
        let app = create_test_app();

        let response = app.oneshot(send_request(payload("id-1", "digest"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]["message"].as_str().unwrap().contains("digest"));
    }

    #[tokio::test]
    async fn test_builtin_type_without_rule_rejected() {
        let mut settings = test_settings();
        settings.rate_limit.rules = HashMap::from([(
            "digest".to_string(),
            RuleConfig {
                max_count: 5,
                window_seconds: 60,
            },
        )]);
        let app = create_test_app_with(settings, Arc::new(SwitchTransport::default()));

        let response = app.oneshot(send_request(payload("id-1", "status"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("Retry-After").is_none());
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_delivery_failure_is_bad_gateway() {
        let transport = Arc::new(SwitchTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let app = create_test_app_with(test_settings(), transport.clone());

        let response = app.clone().oneshot(send_request(payload("id-1", "news"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["code"], "DELIVERY_FAILED");

        // Rolled back: the single daily news slot is still free
        transport.fail.store(false, Ordering::SeqCst);
        let response = app.oneshot(send_request(payload("id-2", "news"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

mod auth_tests {
    use super::*;

    fn app_with_key() -> Router {
        let mut settings = test_settings();
        settings.api.key = Some("secret".to_string());
        create_test_app_with(settings, Arc::new(SwitchTransport::default()))
    }

    #[tokio::test]
    async fn test_missing_key_rejected() {
        let response = app_with_key()
            .oneshot(send_request(payload("id-1", "status")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let mut request = send_request(payload("id-1", "status"));
        request
            .headers_mut()
            .insert(API_KEY_HEADER, "nope".parse().unwrap());

        let response = app_with_key().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_key_accepted() {
        let mut request = send_request(payload("id-1", "status"));
        request
            .headers_mut()
            .insert(API_KEY_HEADER, "secret".parse().unwrap());

        let response = app_with_key().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_probes_skip_auth() {
        let response = app_with_key()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

mod probe_tests {
    use super::*;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = create_test_app().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_readyz_with_memory_store() {
        let response = create_test_app().oneshot(get("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_stats_counts_outcomes() {
        let app = create_test_app();
        app.clone()
            .oneshot(send_request(payload("id-1", "marketing")))
            .await
            .unwrap();
        app.clone()
            .oneshot(send_request(payload("id-1", "marketing")))
            .await
            .unwrap();

        let body = body_json(app.oneshot(get("/stats")).await.unwrap()).await;
        assert_eq!(body["notifications"]["total_requests"], 2);
        assert_eq!(body["notifications"]["delivered"], 1);
        assert_eq!(body["notifications"]["duplicates"], 1);
        assert_eq!(body["store"]["backend"], "memory");
        assert!(body.get("redis").is_none());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = create_test_app();
        app.clone()
            .oneshot(send_request(payload("id-1", "status")))
            .await
            .unwrap();

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("ara_mail_send_outcomes_total"));
    }
}
