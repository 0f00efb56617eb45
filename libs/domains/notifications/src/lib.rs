//! Notifications Domain
//!
//! Transactional email for the application: sign-in links, verification
//! mail and any other one-off message a request handler needs to send.
//!
//! # Features
//!
//! - One outbound channel per process, chosen at startup (hosted API,
//!   SMTP relay or local `sendmail`)
//! - Kill switch and placeholder-recipient suppression
//! - Header-safe sanitization of every outgoing payload
//! - Single attempt per message with a hard deadline
//! - Sign-in link emails with origin rewriting
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Caller      │  ← send / send_verification_link
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ SuppressionGuard│  ← kill switch, synthetic recipients → Skipped
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    Sanitizer    │  ← header-safe from / to / subject / headers
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Dispatcher    │  ← one attempt raced against a timer
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ EmailTransport  │  ← hosted API, SMTP relay, sendmail
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{EnvFlagSource, Mailer, MessagePayload};
//! use std::sync::Arc;
//!
//! let mailer = Mailer::from_env(Arc::new(EnvFlagSource::new()))?;
//!
//! mailer
//!     .send_verification_link("jane@example.com", &callback_url)
//!     .await?;
//! ```

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod flags;
pub mod mailer;
pub mod models;
pub mod providers;
pub mod sanitize;
pub mod suppression;
pub mod templates;
pub mod verification;

// Re-export commonly used types
pub use channel::{select_channel, ChannelConfig, EmailEnv};
pub use dispatcher::Dispatcher;
pub use error::{NotificationError, NotificationResult};
pub use flags::{EnvFlagSource, FeatureFlagSource, StaticFlagSource};
pub use mailer::Mailer;
pub use models::{FailureKind, MessagePayload, SendOutcome, SendReceipt, SkipReason};
pub use providers::{EmailTransport, RecordingTransport};
pub use sanitize::sanitize;
pub use suppression::SuppressionGuard;
pub use templates::TemplateEngine;
pub use verification::{rewrite_origin, VerificationConfig};
