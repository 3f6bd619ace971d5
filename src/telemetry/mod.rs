//! Logging and distributed tracing setup.
//!
//! This module provides:
//! - A `tracing` subscriber with `EnvFilter` (`RUST_LOG`, default `info`)
//! - Human-readable or JSON log output (`telemetry.log_format`)
//! - Optional OTLP span export to collectors like Jaeger or Tempo
//!
//! # Configuration
//!
//! | Key | Environment | Default |
//! |-----|-------------|---------|
//! | `telemetry.log_format` | `ARA_TELEMETRY__LOG_FORMAT` | `pretty` |
//! | `telemetry.otel_enabled` | `ARA_TELEMETRY__OTEL_ENABLED` | `false` |
//! | `telemetry.otel_endpoint` | `ARA_TELEMETRY__OTEL_ENDPOINT` | `http://localhost:4317` |
//! | `telemetry.service_name` | `ARA_TELEMETRY__SERVICE_NAME` | `ara-mail-notifier` |
//! | `telemetry.sampling_ratio` | `ARA_TELEMETRY__SAMPLING_RATIO` | `1.0` |

use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, TelemetryConfig};

pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
    #[error("Failed to build OTLP exporter: {0}")]
    ExporterBuild(String),
}

/// Keeps the tracer provider alive; flushes pending spans when dropped.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    pub fn otel_enabled(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            tracing::info!("Shutting down OpenTelemetry tracer provider");
            if let Err(e) = provider.shutdown() {
                eprintln!("OpenTelemetry shutdown failed: {e}");
            }
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the process.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (json_layer, pretty_layer) = match config.log_format {
        LogFormat::Json => (
            Some(tracing_subscriber::fmt::layer().json().with_current_span(true)),
            None,
        ),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer())),
    };

    let provider = if config.otel_enabled {
        Some(init_otel_tracer(config)?)
    } else {
        None
    };
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    if config.otel_enabled {
        tracing::info!(
            endpoint = %config.otel_endpoint,
            service_name = %config.service_name,
            sampling_ratio = %config.sampling_ratio,
            "OpenTelemetry tracing initialized"
        );
    } else {
        tracing::info!("Tracing initialized (OpenTelemetry disabled)");
    }

    Ok(TelemetryGuard { provider })
}

fn sampler_for(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

fn init_otel_tracer(config: &TelemetryConfig) -> TelemetryResult<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()
        .map_err(|e| TelemetryError::ExporterBuild(e.to_string()))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(sampler_for(config.sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(Resource::new(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                config.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ),
        ]))
        .build();

    Ok(provider)
}
