use std::collections::HashMap;
use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Users loaded into the in-memory identity directory at startup
    #[serde(default)]
    pub users: Vec<UserSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_cb_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_cb_success_threshold")]
    pub circuit_breaker_success_threshold: u32,
    #[serde(default = "default_cb_reset_timeout")]
    pub circuit_breaker_reset_timeout_seconds: u64,
}

/// Counter store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendType {
    /// Process-local store (single instance, lost on restart)
    #[default]
    Memory,
    /// Shared Redis store
    Redis,
}

impl StoreBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackendType::Memory => "memory",
            StoreBackendType::Redis => "redis",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackendType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Prefix prepended to every rate limit counter key
    #[serde(default = "default_rate_limit_prefix")]
    pub key_prefix: String,
    /// Rules keyed by category name
    #[serde(default = "default_rules")]
    pub rules: HashMap<String, RuleConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    pub max_count: u32,
    pub window_seconds: u64,
}

impl RuleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_idempotency_prefix")]
    pub key_prefix: String,
    /// How long a processed marker is kept
    #[serde(default = "default_idempotency_ttl")]
    pub ttl_seconds: u64,
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailBackendType {
    /// Deliver through an SMTP relay
    Smtp,
    /// Only log the message (development)
    #[default]
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub backend: MailBackendType,
    #[serde(default = "default_mail_from")]
    pub from: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Export spans over OTLP
    #[serde(default)]
    pub otel_enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_cb_failure_threshold() -> u32 {
    5
}

fn default_cb_success_threshold() -> u32 {
    2
}

fn default_cb_reset_timeout() -> u64 {
    30
}

fn default_rate_limit_prefix() -> String {
    "ara:ratelimit".to_string()
}

fn default_rules() -> HashMap<String, RuleConfig> {
    HashMap::from([
        (
            "status".to_string(),
            RuleConfig {
                max_count: 2,
                window_seconds: 60,
            },
        ),
        (
            "news".to_string(),
            RuleConfig {
                max_count: 1,
                window_seconds: 86_400,
            },
        ),
        (
            "marketing".to_string(),
            RuleConfig {
                max_count: 3,
                window_seconds: 3_600,
            },
        ),
    ])
}

fn default_idempotency_prefix() -> String {
    "ara:idempotency".to_string()
}

fn default_idempotency_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_mail_from() -> String {
    "no-reply@example.com".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout() -> u64 {
    10
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "ara-mail-notifier".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("redis.url", "redis://localhost:6379")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // ARA_SERVER__PORT, ARA_MAIL__SMTP_HOST, ARA_RATE_LIMIT__RULES__STATUS__MAX_COUNT, ...
            .add_source(
                Environment::with_prefix("ARA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject durations that would expire markers and counters on the next read
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idempotency.ttl_seconds == 0 {
            return Err(ConfigError::Message(
                "idempotency.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        let mut names: Vec<&String> = self.rate_limit.rules.keys().collect();
        names.sort();
        for name in names {
            let rule = &self.rate_limit.rules[name];
            if rule.window_seconds == 0 {
                return Err(ConfigError::Message(format!(
                    "rate_limit.rules.{name}.window_seconds must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            circuit_breaker_failure_threshold: default_cb_failure_threshold(),
            circuit_breaker_success_threshold: default_cb_success_threshold(),
            circuit_breaker_reset_timeout_seconds: default_cb_reset_timeout(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            key_prefix: default_rate_limit_prefix(),
            rules: default_rules(),
        }
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_idempotency_prefix(),
            ttl_seconds: default_idempotency_ttl(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackendType::default(),
            from: default_mail_from(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            timeout_seconds: default_smtp_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            otel_enabled: false,
            otel_endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
