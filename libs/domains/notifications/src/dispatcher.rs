//! Single-attempt dispatch with a hard deadline.
//!
//! The send is raced against a timer. When the timer wins the in-flight
//! future is dropped, which cancels the underlying request and closes its
//! connection; nothing keeps running in the background.

use crate::channel::ChannelConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{MessagePayload, SendOutcome};
use crate::providers::{transport_for, EmailTransport};
use observability::DispatchMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

/// Deadline applied when `EMAIL_SEND_TIMEOUT_MS` is unset.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Sends payloads over one transport, once each.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn EmailTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn EmailTransport>) -> Self {
        Self { transport }
    }

    /// Dispatcher for the channel chosen at startup.
    pub fn from_channel(channel: &ChannelConfig) -> NotificationResult<Self> {
        Ok(Self::new(transport_for(channel)?))
    }

    /// Label of the underlying channel.
    pub fn channel(&self) -> &'static str {
        self.transport.name()
    }

    /// Make exactly one attempt to send `payload`, giving up after `timeout`.
    ///
    /// Never retries. Failures are logged with channel, subject and sender
    /// only; the recipient and provider credentials stay out of the log.
    pub async fn dispatch(&self, payload: &MessagePayload, timeout: Duration) -> SendOutcome {
        let channel = self.transport.name();
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, self.transport.send(payload)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(NotificationError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(receipt) => {
                debug!(
                    channel = channel,
                    subject = %payload.subject,
                    message_id = ?receipt.message_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Email dispatched"
                );
                DispatchMetrics::record_sent(channel, elapsed);
                SendOutcome::Sent {
                    provider_message_id: receipt.message_id,
                }
            }
            Err(cause) => {
                let kind = cause.kind().map(|k| k.as_str()).unwrap_or("transport_error");
                error!(
                    channel = channel,
                    subject = %payload.subject,
                    from = %payload.from,
                    kind = kind,
                    error = %cause,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Failed to send email"
                );
                DispatchMetrics::record_failed(channel, kind, elapsed);
                SendOutcome::Failed { cause }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("channel", &self.transport.name())
            .finish()
    }
}

/// Reads `EMAIL_SEND_TIMEOUT_MS`, defaulting to thirty seconds.
pub fn send_timeout_from_env() -> NotificationResult<Duration> {
    let millis = core_config::env_parse::<u64>(
        "EMAIL_SEND_TIMEOUT_MS",
        DEFAULT_SEND_TIMEOUT.as_millis() as u64,
    )?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureKind, SendReceipt};
    use crate::providers::MockEmailTransport;
    use std::future;

    fn payload() -> MessagePayload {
        MessagePayload::new("App <noreply@app.io>", "jane@example.com", "Sign in", "<p>Hi</p>")
    }

    #[tokio::test]
    async fn test_sent_outcome_carries_message_id() {
        let mut transport = MockEmailTransport::new();
        transport.expect_name().return_const("hosted_api");
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(SendReceipt::new(Some("msg_1".to_string()))));

        let outcome = Dispatcher::new(Arc::new(transport))
            .dispatch(&payload(), DEFAULT_SEND_TIMEOUT)
            .await;

        assert!(matches!(
            outcome,
            SendOutcome::Sent { provider_message_id: Some(ref id) } if id == "msg_1"
        ));
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let mut transport = MockEmailTransport::new();
        transport.expect_name().return_const("smtp_relay");
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(NotificationError::Transport("connection refused".to_string())));

        let outcome = Dispatcher::new(Arc::new(transport))
            .dispatch(&payload(), DEFAULT_SEND_TIMEOUT)
            .await;

        let SendOutcome::Failed { cause } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(cause.kind(), Some(FailureKind::TransportError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_at_deadline() {
        struct Hangs;

        #[async_trait::async_trait]
        impl EmailTransport for Hangs {
            async fn send(&self, _payload: &MessagePayload) -> NotificationResult<SendReceipt> {
                future::pending().await
            }

            fn name(&self) -> &'static str {
                "hosted_api"
            }
        }

        let started = Instant::now();
        let outcome = Dispatcher::new(Arc::new(Hangs))
            .dispatch(&payload(), Duration::from_millis(30_000))
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30_000));
        assert!(elapsed < Duration::from_millis(30_010));
        assert!(matches!(
            outcome,
            SendOutcome::Failed {
                cause: NotificationError::Timeout { timeout_ms: 30_000 }
            }
        ));
    }

    #[test]
    fn test_send_timeout_from_env() {
        temp_env::with_var_unset("EMAIL_SEND_TIMEOUT_MS", || {
            assert_eq!(send_timeout_from_env().unwrap(), DEFAULT_SEND_TIMEOUT);
        });
        temp_env::with_var("EMAIL_SEND_TIMEOUT_MS", Some("5000"), || {
            assert_eq!(send_timeout_from_env().unwrap(), Duration::from_secs(5));
        });
        temp_env::with_var("EMAIL_SEND_TIMEOUT_MS", Some("soon"), || {
            assert!(matches!(
                send_timeout_from_env(),
                Err(NotificationError::Configuration(_))
            ));
        });
    }
}
