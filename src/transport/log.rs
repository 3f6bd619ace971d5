//! Transport that only logs deliveries

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{MailTransport, TransportError};

#[derive(Debug, Default)]
pub struct LogMailTransport {
    delivered: AtomicU64,
}

impl LogMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MailTransport for LogMailTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), TransportError> {
        if address.trim().is_empty() {
            return Err(TransportError::InvalidAddress {
                address: address.to_string(),
                reason: "empty address".to_string(),
            });
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            address = %address,
            subject = %subject,
            body_len = body.len(),
            "Mail delivered (log transport)"
        );
        Ok(())
    }
}
