use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::domain::idempotency::IdempotencyGuard;
use crate::domain::identity::{DirectoryError, IdentityDirectory};
use crate::domain::ratelimit::{RateLimitError, RateLimiter};
use crate::metrics::DispatchMetrics;
use crate::transport::{MailTransport, TransportError};

use super::types::NotificationRequest;

/// Terminal failure of [`NotificationDispatcher::send`]
#[derive(Debug, Error)]
pub enum SendError {
    #[error("notification '{correlation_id}' was already processed")]
    Duplicate { correlation_id: String },

    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),

    #[error("rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("delivery failed: {0}")]
    DeliveryFailed(#[source] TransportError),

    /// `delivered` is set when the message went out but could not be marked
    /// processed; a retry may deliver it again.
    #[error("internal error: {message}")]
    Internal { message: String, delivered: bool },
}

/// Fieldless classification of [`SendError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorKind {
    Duplicate,
    InvalidRecipient,
    RateLimited,
    DeliveryFailed,
    Internal,
}

impl SendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendErrorKind::Duplicate => "DUPLICATE",
            SendErrorKind::InvalidRecipient => "INVALID_RECIPIENT",
            SendErrorKind::RateLimited => "RATE_LIMITED",
            SendErrorKind::DeliveryFailed => "DELIVERY_FAILED",
            SendErrorKind::Internal => "INTERNAL",
        }
    }
}

impl SendError {
    fn internal(message: impl Into<String>) -> Self {
        SendError::Internal {
            message: message.into(),
            delivered: false,
        }
    }

    pub fn kind(&self) -> SendErrorKind {
        match self {
            SendError::Duplicate { .. } => SendErrorKind::Duplicate,
            SendError::InvalidRecipient(_) => SendErrorKind::InvalidRecipient,
            SendError::RateLimited { .. } => SendErrorKind::RateLimited,
            SendError::DeliveryFailed(_) => SendErrorKind::DeliveryFailed,
            SendError::Internal { .. } => SendErrorKind::Internal,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SendError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether the message reached the transport despite the error
    pub fn delivered(&self) -> bool {
        matches!(self, SendError::Internal { delivered: true, .. })
    }
}

/// Outcome counters for the dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub total_requests: AtomicU64,
    pub delivered: AtomicU64,
    pub duplicates: AtomicU64,
    pub invalid_recipients: AtomicU64,
    pub rate_limited: AtomicU64,
    pub delivery_failures: AtomicU64,
    pub internal_errors: AtomicU64,
    /// Compensating decrements that themselves failed
    pub rollback_failures: AtomicU64,
}

impl DispatcherStats {
    fn record(&self, result: &Result<(), SendError>) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            Ok(()) => &self.delivered,
            Err(e) => match e.kind() {
                SendErrorKind::Duplicate => &self.duplicates,
                SendErrorKind::InvalidRecipient => &self.invalid_recipients,
                SendErrorKind::RateLimited => &self.rate_limited,
                SendErrorKind::DeliveryFailed => &self.delivery_failures,
                SendErrorKind::Internal => &self.internal_errors,
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            invalid_recipients: self.invalid_recipients.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            rollback_failures: self.rollback_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_requests: u64,
    pub delivered: u64,
    pub duplicates: u64,
    pub invalid_recipients: u64,
    pub rate_limited: u64,
    pub delivery_failures: u64,
    pub internal_errors: u64,
    pub rollback_failures: u64,
}

fn outcome_label(result: &Result<(), SendError>) -> &'static str {
    match result {
        Ok(()) => "delivered",
        Err(e) => match e.kind() {
            SendErrorKind::Duplicate => "duplicate",
            SendErrorKind::InvalidRecipient => "invalid_recipient",
            SendErrorKind::RateLimited => "rate_limited",
            SendErrorKind::DeliveryFailed => "delivery_failed",
            SendErrorKind::Internal => "internal",
        },
    }
}

/// Runs one notification request through idempotency, identity, rate
/// limiting and delivery.
///
/// Shared behind `Arc`; the only state it owns is its statistics.
pub struct NotificationDispatcher {
    idempotency: IdempotencyGuard,
    limiter: RateLimiter,
    directory: Arc<dyn IdentityDirectory>,
    transport: Arc<dyn MailTransport>,
    idempotency_ttl: Duration,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(
        idempotency: IdempotencyGuard,
        limiter: RateLimiter,
        directory: Arc<dyn IdentityDirectory>,
        transport: Arc<dyn MailTransport>,
        idempotency_ttl: Duration,
    ) -> Self {
        Self {
            idempotency,
            limiter,
            directory,
            transport,
            idempotency_ttl,
            stats: DispatcherStats::default(),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Send one notification.
    ///
    /// Steps, each ending the call on failure:
    /// 1. reject a correlation id that was already processed
    /// 2. resolve the recipient's address
    /// 3. take one unit of rate limit capacity
    /// 4. deliver, giving the capacity back if delivery fails
    /// 5. mark the correlation id processed
    ///
    /// Nothing is retried. Cancelling the returned future mid-flight skips
    /// the rollback of step 4.
    #[tracing::instrument(
        name = "dispatcher.send",
        skip(self, request),
        fields(
            correlation_id = %request.correlation_id,
            recipient_id = %request.recipient_id,
            category = %request.category,
            outcome = tracing::field::Empty
        )
    )]
    pub async fn send(&self, request: &NotificationRequest) -> Result<(), SendError> {
        let result = self.run(request).await;

        let outcome = outcome_label(&result);
        tracing::Span::current().record("outcome", outcome);
        self.stats.record(&result);
        DispatchMetrics::record_outcome(outcome);

        match &result {
            Ok(()) => tracing::info!("Notification delivered"),
            Err(e) if e.kind() == SendErrorKind::Internal => {
                tracing::error!(error = %e, delivered = e.delivered(), "Notification failed")
            }
            Err(e) => tracing::info!(error = %e, "Notification not sent"),
        }

        result
    }

    async fn run(&self, request: &NotificationRequest) -> Result<(), SendError> {
        let correlation_id = request.correlation_id.as_str();

        let processed = self
            .idempotency
            .is_processed(correlation_id)
            .await
            .map_err(|e| SendError::internal(format!("idempotency check failed: {e}")))?;
        if processed {
            return Err(SendError::Duplicate {
                correlation_id: correlation_id.to_string(),
            });
        }

        let address = match self.directory.resolve(&request.recipient_id).await {
            Ok(address) => address,
            Err(DirectoryError::NotFound(id)) => return Err(SendError::InvalidRecipient(id)),
            Err(e) => return Err(SendError::internal(format!("recipient lookup failed: {e}"))),
        };

        let lock = match self
            .limiter
            .acquire_if_available(&request.recipient_id, &request.category)
            .await
        {
            Ok(lock) => lock,
            Err(RateLimitError::Exceeded { retry_after }) => {
                return Err(SendError::RateLimited { retry_after })
            }
            Err(e) => return Err(SendError::internal(format!("rate limiter failed: {e}"))),
        };

        let started = Instant::now();
        let delivery = self
            .transport
            .deliver(&address, request.category.subject(), &request.body)
            .await;
        DispatchMetrics::record_delivery_latency(started.elapsed());

        if let Err(e) = delivery {
            let key = lock.key().to_string();
            if let Err(release_err) = lock.release().await {
                self.stats.rollback_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    key = %key,
                    error = %release_err,
                    "Failed to roll back rate limit admission"
                );
            }
            return Err(SendError::DeliveryFailed(e));
        }

        // Delivered: the admission stands
        drop(lock);

        self.idempotency
            .mark_processed(correlation_id, self.idempotency_ttl)
            .await
            .map_err(|e| SendError::Internal {
                message: format!("delivered but failed to mark processed: {e}"),
                delivered: true,
            })
    }
}
