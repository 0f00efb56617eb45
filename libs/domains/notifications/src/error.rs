//! Error types for the notifications domain.

use crate::models::FailureKind;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Text shown to end users for any send failure.
pub const USER_FACING_SEND_ERROR: &str = "We could not send the email. Please try again later.";

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The channel did not answer before the dispatch deadline.
    #[error("Email send timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The hosted API answered with a non-success status.
    #[error("Email provider rejected the message ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    /// Connection, protocol or authentication failure on the way out.
    #[error("Email transport error: {0}")]
    Transport(String),

    /// No usable channel could be assembled from the configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// A link could not be parsed or rewritten.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl NotificationError {
    /// Classify a dispatch failure. `None` for errors raised before dispatch.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Timeout { .. } => Some(FailureKind::Timeout),
            Self::ProviderRejected { .. } => Some(FailureKind::ProviderRejected),
            Self::Transport(_) => Some(FailureKind::TransportError),
            Self::Configuration(_) | Self::Template(_) | Self::InvalidUrl(_) => None,
        }
    }

    /// Generic message for end users. Provider text and credentials never
    /// leave through this path.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_SEND_ERROR
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: hosted endpoints may carry tokens in query strings.
        NotificationError::Transport(err.without_url().to_string())
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        NotificationError::Transport(format!("Failed to build message: {}", err))
    }
}

impl From<lettre::address::AddressError> for NotificationError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotificationError::Transport(format!("Invalid address: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotificationError::Transport(format!("SMTP send failed: {}", err))
    }
}

impl From<lettre::transport::sendmail::Error> for NotificationError {
    fn from(err: lettre::transport::sendmail::Error) -> Self {
        NotificationError::Transport(format!("sendmail failed: {}", err))
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<url::ParseError> for NotificationError {
    fn from(err: url::ParseError) -> Self {
        NotificationError::InvalidUrl(err.to_string())
    }
}

impl From<regex::Error> for NotificationError {
    fn from(err: regex::Error) -> Self {
        NotificationError::Configuration(format!("Invalid synthetic recipient pattern: {}", err))
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classifies_dispatch_failures() {
        assert_eq!(
            NotificationError::Timeout { timeout_ms: 10 }.kind(),
            Some(FailureKind::Timeout)
        );
        assert_eq!(
            NotificationError::ProviderRejected {
                status: 422,
                message: "bad address".to_string()
            }
            .kind(),
            Some(FailureKind::ProviderRejected)
        );
        assert_eq!(
            NotificationError::Transport("refused".to_string()).kind(),
            Some(FailureKind::TransportError)
        );
        assert_eq!(NotificationError::InvalidUrl("x".to_string()).kind(), None);
    }

    #[test]
    fn test_user_message_hides_provider_details() {
        let err = NotificationError::ProviderRejected {
            status: 401,
            message: "invalid api key re_123".to_string(),
        };
        assert!(!err.user_message().contains("re_123"));
        assert_eq!(err.user_message(), USER_FACING_SEND_ERROR);
    }

    #[test]
    fn test_timeout_display() {
        let err = NotificationError::Timeout { timeout_ms: 30_000 };
        assert_eq!(err.to_string(), "Email send timed out after 30000ms");
    }
}
