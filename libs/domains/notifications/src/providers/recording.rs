//! In-memory transport for tests and dry runs.

use super::EmailTransport;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{MessagePayload, SendReceipt};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Transport that records every payload instead of sending it.
///
/// Clones share the same record, so a test can keep one handle and give the
/// other to a `Dispatcher`.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<MessagePayload>>>,
    failure: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every send fails with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Arc::default(),
            failure: Some(message.into()),
        }
    }

    /// Payloads handed to the transport, in order.
    pub async fn sent(&self) -> Vec<MessagePayload> {
        self.sent.lock().await.clone()
    }

    /// Number of send calls, including failed ones.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, payload: &MessagePayload) -> NotificationResult<SendReceipt> {
        let mut sent = self.sent.lock().await;
        sent.push(payload.clone());

        match &self.failure {
            Some(message) => Err(NotificationError::Transport(message.clone())),
            None => Ok(SendReceipt::new(Some(format!("recorded-{}", sent.len())))),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
