//! Mail transports.
//!
//! - `SmtpMailTransport`: async SMTP delivery through lettre
//! - `LogMailTransport`: writes deliveries to the log (default, for development)

mod log;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{MailBackendType, MailConfig};

pub use self::log::LogMailTransport;
pub use self::smtp::SmtpMailTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid mail address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Delivers one composed message to one address.
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, address: &str, subject: &str, body: &str)
        -> Result<(), TransportError>;
}

/// Create the mail transport selected by configuration.
pub fn create_mail_transport(config: &MailConfig) -> Result<Arc<dyn MailTransport>, TransportError> {
    match config.backend {
        MailBackendType::Smtp => {
            tracing::info!(
                host = %config.smtp_host,
                port = config.smtp_port,
                "Creating SMTP mail transport"
            );
            Ok(Arc::new(SmtpMailTransport::new(config)?))
        }
        MailBackendType::Log => {
            tracing::info!("Creating log mail transport, messages will not leave this process");
            Ok(Arc::new(LogMailTransport::new()))
        }
    }
}
