//! SMTP relay provider implementation using lettre.
//!
//! One connection per message: the transport is built without a pool, so
//! nothing is left open between sends and a cancelled send drops its socket.

use super::{build_message, EmailTransport};
use crate::channel::SmtpRelayConfig;
use crate::error::NotificationResult;
use crate::models::{MessagePayload, SendReceipt};
use async_trait::async_trait;
use lettre::{
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use secrecy::ExposeSecret;
use tracing::debug;

/// SMTP relay provider.
pub struct SmtpRelayProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpRelayConfig,
}

impl SmtpRelayProvider {
    pub fn new(config: SmtpRelayConfig) -> NotificationResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    /// Build the SMTP transport based on configuration.
    fn build_transport(
        config: &SmtpRelayConfig,
    ) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let tls_parameters = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build_rustls()?;

        let tls = if config.secure {
            Tls::Wrapper(tls_parameters)
        } else if config.require_starttls {
            Tls::Required(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(tls)
            .timeout(Some(config.timeout));

        if let Some(credentials) = &config.credentials {
            builder = builder.credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.expose_secret().clone(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl EmailTransport for SmtpRelayProvider {
    async fn send(&self, payload: &MessagePayload) -> NotificationResult<SendReceipt> {
        debug!(
            subject = %payload.subject,
            host = %self.config.host,
            port = self.config.port,
            secure = self.config.secure,
            "Sending email via SMTP relay"
        );

        let message = build_message(payload)?;
        let response = self.transport.send(message).await?;

        // The final 250 line usually carries the queue id.
        let message_id = response.message().next().map(|s| s.to_string());
        debug!(message_id = ?message_id, "SMTP relay accepted message");

        Ok(SendReceipt::new(message_id))
    }

    fn name(&self) -> &'static str {
        "smtp_relay"
    }
}
