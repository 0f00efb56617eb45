//! Local `sendmail` relay.

use super::{build_message, EmailTransport};
use crate::channel::LocalRelayConfig;
use crate::error::NotificationResult;
use crate::models::{MessagePayload, SendReceipt};
use async_trait::async_trait;
use lettre::{AsyncSendmailTransport, AsyncTransport, Tokio1Executor};
use tracing::debug;

/// Pipes messages into the local `sendmail` binary.
pub struct LocalRelayProvider {
    transport: AsyncSendmailTransport<Tokio1Executor>,
    config: LocalRelayConfig,
}

impl LocalRelayProvider {
    pub fn new(config: LocalRelayConfig) -> Self {
        let transport =
            AsyncSendmailTransport::<Tokio1Executor>::new_with_command(config.binary_path.as_os_str());
        Self { transport, config }
    }
}

#[async_trait]
impl EmailTransport for LocalRelayProvider {
    async fn send(&self, payload: &MessagePayload) -> NotificationResult<SendReceipt> {
        debug!(
            subject = %payload.subject,
            path = %self.config.binary_path.display(),
            "Sending email via local sendmail"
        );

        let message = build_message(payload)?;
        self.transport.send(message).await?;

        // sendmail reports nothing beyond its exit status.
        Ok(SendReceipt::default())
    }

    fn name(&self) -> &'static str {
        "local_relay"
    }
}
