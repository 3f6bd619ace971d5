//! SMTP transport built on lettre's async tokio transport

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;

use super::{MailTransport, TransportError};

pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

impl SmtpMailTransport {
    /// Build the transport. No connection is made until the first delivery.
    pub fn new(config: &MailConfig) -> Result<Self, TransportError> {
        let from = parse_mailbox(&config.from)?;

        // Plain connection; TLS is expected to be terminated by a local relay
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn compose(&self, address: &str, subject: &str, body: &str) -> Result<Message, TransportError> {
        Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(address)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| TransportError::Message(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn deliver(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), TransportError> {
        let message = self.compose(address, subject, body)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| TransportError::Delivery(e.to_string()))?;

        tracing::debug!(address = %address, subject = %subject, "Mail accepted by SMTP server");
        Ok(())
    }
}
