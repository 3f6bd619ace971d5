mod settings;

pub use settings::{
    ApiConfig, IdempotencyConfig, LogFormat, MailBackendType, MailConfig, RateLimitSettings,
    RedisConfig, RuleConfig, ServerConfig, Settings, StoreBackendType, StoreConfig,
    TelemetryConfig, UserSeed,
};
