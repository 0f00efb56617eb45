//! Outbound transports.
//!
//! This module contains the `EmailTransport` trait and one implementation
//! per channel: the hosted HTTP API, a direct SMTP relay and the local
//! `sendmail` binary.

mod hosted_api;
mod message;
mod recording;
mod sendmail;
mod smtp;

pub use hosted_api::HostedApiProvider;
pub use message::build_message;
pub use recording::RecordingTransport;
pub use sendmail::LocalRelayProvider;
pub use smtp::SmtpRelayProvider;

use crate::channel::ChannelConfig;
use crate::error::NotificationResult;
use crate::models::{MessagePayload, SendReceipt};
use async_trait::async_trait;
use std::sync::Arc;

/// A single outbound channel.
///
/// Implementations make exactly one attempt per call and never retry.
/// Payloads reaching a transport have already been sanitized.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Hand the message to the channel.
    async fn send(&self, payload: &MessagePayload) -> NotificationResult<SendReceipt>;

    /// Channel label for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Build the transport for the selected channel.
pub fn transport_for(channel: &ChannelConfig) -> NotificationResult<Arc<dyn EmailTransport>> {
    let transport: Arc<dyn EmailTransport> = match channel {
        ChannelConfig::HostedApi(config) => Arc::new(HostedApiProvider::new(config.clone())),
        ChannelConfig::SmtpRelay(config) => Arc::new(SmtpRelayProvider::new(config.clone())?),
        ChannelConfig::LocalRelay(config) => Arc::new(LocalRelayProvider::new(config.clone())),
    };
    Ok(transport)
}
