//! Data models for the notifications domain.

use crate::error::{NotificationError, NotificationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Payload
// ============================================================================

/// A transactional message ready to leave the process.
///
/// Optional parts have fixed defaults (`text` is `None`, no extra headers)
/// so providers never probe for missing fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Sender, either `addr@host` or `Display Name <addr@host>`.
    pub from: String,
    /// Recipient, same forms as `from`.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain text alternative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Additional mail headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_headers: BTreeMap<String, String>,
}

impl MessagePayload {
    /// Create a payload with the required fields.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            text: None,
            extra_headers: BTreeMap::new(),
        }
    }

    /// Set the plain text alternative.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add an extra header. A later value for the same name wins.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Why a send was skipped without touching any channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The global `emails` kill switch is on.
    KillSwitch,
    /// The recipient is a placeholder address that no mailbox backs.
    SyntheticRecipient,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::KillSwitch => "kill_switch",
            SkipReason::SyntheticRecipient => "synthetic_recipient",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ProviderRejected,
    TransportError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ProviderRejected => "provider_rejected",
            FailureKind::TransportError => "transport_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one call into the dispatch path.
#[derive(Debug)]
pub enum SendOutcome {
    /// The channel accepted the message. The id is advisory only.
    Sent { provider_message_id: Option<String> },
    /// Policy decided not to send. Not an error.
    Skipped { reason: SkipReason },
    /// The single attempt failed.
    Failed { cause: NotificationError },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SendOutcome::Skipped { .. })
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SendOutcome::Sent { .. } => "sent",
            SendOutcome::Skipped { reason } => reason.as_str(),
            SendOutcome::Failed { cause } => cause
                .kind()
                .map(|kind| kind.as_str())
                .unwrap_or("failed"),
        }
    }

    /// Re-raise a failure to the caller; `Sent` and `Skipped` pass through.
    pub fn into_result(self) -> NotificationResult<SendOutcome> {
        match self {
            SendOutcome::Failed { cause } => Err(cause),
            other => Ok(other),
        }
    }
}

/// What a transport reports after the channel accepted a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider-specific message ID for tracking, when one was returned.
    pub message_id: Option<String>,
}

impl SendReceipt {
    pub fn new(message_id: Option<String>) -> Self {
        Self { message_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults() {
        let payload = MessagePayload::new("a@x.io", "b@y.io", "Hi", "<p>Hi</p>");
        assert_eq!(payload.text, None);
        assert!(payload.extra_headers.is_empty());

        let payload = payload
            .with_text("Hi")
            .with_header("X-Entity-Ref-ID", "1")
            .with_header("X-Entity-Ref-ID", "2");
        assert_eq!(payload.text.as_deref(), Some("Hi"));
        assert_eq!(payload.extra_headers.len(), 1);
        assert_eq!(payload.extra_headers["X-Entity-Ref-ID"], "2");
    }

    #[test]
    fn test_payload_deserializes_without_optional_fields() {
        let payload: MessagePayload = serde_json::from_str(
            r#"{"from":"a@x.io","to":"b@y.io","subject":"s","html":"<p></p>"}"#,
        )
        .unwrap();
        assert_eq!(payload.text, None);
        assert!(payload.extra_headers.is_empty());
    }

    #[test]
    fn test_into_result_reraises_failures() {
        let sent = SendOutcome::Sent {
            provider_message_id: None,
        };
        assert!(sent.into_result().unwrap().is_sent());

        let skipped = SendOutcome::Skipped {
            reason: SkipReason::KillSwitch,
        };
        assert!(skipped.into_result().unwrap().is_skipped());

        let failed = SendOutcome::Failed {
            cause: NotificationError::Timeout { timeout_ms: 5 },
        };
        assert!(matches!(
            failed.into_result(),
            Err(NotificationError::Timeout { timeout_ms: 5 })
        ));
    }

    #[test]
    fn test_outcome_labels() {
        let failed = SendOutcome::Failed {
            cause: NotificationError::Transport("refused".to_string()),
        };
        assert_eq!(failed.label(), "transport_error");
        assert_eq!(
            SendOutcome::Skipped {
                reason: SkipReason::SyntheticRecipient
            }
            .label(),
            "synthetic_recipient"
        );
    }
}
