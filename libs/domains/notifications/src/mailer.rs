//! The entry point for sending mail.
//!
//! `Mailer` wires the pieces together in a fixed order: suppression check,
//! relay headers, sanitization, then a single timed dispatch.

use crate::channel::{select_channel, ChannelConfig, EmailEnv};
use crate::dispatcher::{send_timeout_from_env, Dispatcher, DEFAULT_SEND_TIMEOUT};
use crate::error::NotificationResult;
use crate::flags::FeatureFlagSource;
use crate::models::{MessagePayload, SendOutcome};
use crate::sanitize::sanitize;
use crate::suppression::SuppressionGuard;
use crate::templates::TemplateEngine;
use crate::verification::VerificationConfig;
use core_config::FromEnv;
use observability::DispatchMetrics;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Transactional mail sender. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Mailer {
    channel: Arc<ChannelConfig>,
    guard: Arc<SuppressionGuard>,
    dispatcher: Arc<Dispatcher>,
    timeout: Duration,
    extra_headers: Arc<BTreeMap<String, String>>,
    verification: Arc<VerificationConfig>,
    templates: TemplateEngine,
}

impl Mailer {
    /// Assemble a mailer from already-built parts.
    pub fn new(
        channel: ChannelConfig,
        guard: SuppressionGuard,
        dispatcher: Dispatcher,
        verification: VerificationConfig,
    ) -> NotificationResult<Self> {
        Ok(Self {
            channel: Arc::new(channel),
            guard: Arc::new(guard),
            dispatcher: Arc::new(dispatcher),
            timeout: DEFAULT_SEND_TIMEOUT,
            extra_headers: Arc::new(BTreeMap::new()),
            verification: Arc::new(verification),
            templates: TemplateEngine::new()?,
        })
    }

    /// Build everything from the environment. Call once at startup.
    pub fn from_env(flags: Arc<dyn FeatureFlagSource>) -> NotificationResult<Self> {
        let env = EmailEnv::from_env();
        let channel = select_channel(&env);
        let dispatcher = Dispatcher::from_channel(&channel)?;
        let guard = SuppressionGuard::from_env(flags)?;
        let verification = VerificationConfig::from_env()?;

        let extra_headers = extra_headers_for(
            &channel,
            env.server_host.as_deref(),
            core_config::env_optional("EMAIL_EXTRA_HEADERS").as_deref(),
        );

        Ok(Self::new(channel, guard, dispatcher, verification)?
            .with_timeout(send_timeout_from_env()?)
            .with_extra_headers(extra_headers))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Headers added to every outgoing message unless the payload sets them.
    pub fn with_extra_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.extra_headers = Arc::new(headers);
        self
    }

    /// The channel selected at startup.
    pub fn channel(&self) -> &ChannelConfig {
        &self.channel
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sender used for sign-in link emails.
    pub fn verification_sender(&self) -> String {
        self.verification.sender()
    }

    /// Send one message.
    ///
    /// Returns `Skipped` without touching the network when policy says so.
    /// A failed dispatch comes back as `Err` after it has been logged.
    pub async fn send(&self, mut payload: MessagePayload) -> NotificationResult<SendOutcome> {
        let channel = self.dispatcher.channel();

        if let Some(reason) = self.guard.check(&payload.to).await {
            info!(
                channel = channel,
                reason = %reason,
                subject = %payload.subject,
                "Email skipped"
            );
            DispatchMetrics::record_skipped(channel, reason.as_str());
            return Ok(SendOutcome::Skipped { reason });
        }

        for (name, value) in self.extra_headers.iter() {
            payload
                .extra_headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }

        let payload = sanitize(payload);
        self.dispatcher
            .dispatch(&payload, self.timeout)
            .await
            .into_result()
    }

    /// Send a sign-in link. A skipped send counts as success.
    pub async fn send_verification_link(&self, to: &str, raw_url: &str) -> NotificationResult<()> {
        let payload = self
            .verification
            .build_payload(&self.templates, to, raw_url)?;
        self.send(payload).await.map(|_| ())
    }
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("channel", &self.channel.name())
            .field("timeout", &self.timeout)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Extra headers from `EMAIL_EXTRA_HEADERS`, a JSON object of strings.
///
/// They only apply when the active channel is the relay named by
/// `EMAIL_SERVER_HOST`; every other channel gets none.
pub fn extra_headers_for(
    channel: &ChannelConfig,
    server_host: Option<&str>,
    raw: Option<&str>,
) -> BTreeMap<String, String> {
    let Some(raw) = raw else {
        return BTreeMap::new();
    };

    let applies = matches!(
        (channel.relay_host(), server_host),
        (Some(active), Some(configured)) if active.eq_ignore_ascii_case(configured)
    );
    if !applies {
        return BTreeMap::new();
    }

    match serde_json::from_str::<BTreeMap<String, String>>(raw) {
        Ok(headers) => headers,
        Err(e) => {
            warn!(error = %e, "EMAIL_EXTRA_HEADERS is not a JSON object of strings, ignoring");
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{LocalRelayConfig, SmtpRelayConfig};
    use crate::flags::{StaticFlagSource, EMAILS_FEATURE};
    use crate::models::SkipReason;
    use crate::providers::RecordingTransport;
    use std::path::PathBuf;

    fn relay(host: &str) -> ChannelConfig {
        ChannelConfig::SmtpRelay(SmtpRelayConfig {
            host: host.to_string(),
            port: 587,
            secure: false,
            credentials: None,
            require_starttls: false,
            accept_invalid_certs: false,
            timeout: Duration::from_secs(30),
        })
    }

    fn mailer(flags: StaticFlagSource, transport: RecordingTransport) -> Mailer {
        Mailer::new(
            ChannelConfig::LocalRelay(LocalRelayConfig {
                binary_path: PathBuf::from("/usr/sbin/sendmail"),
            }),
            SuppressionGuard::with_default_pattern(Arc::new(flags)),
            Dispatcher::new(Arc::new(transport)),
            VerificationConfig {
                app_url: "https://correct-host".to_string(),
                app_name: "Acme".to_string(),
                from: Some("noreply@acme.io".to_string()),
                from_name: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_extra_headers_only_for_configured_relay() {
        let raw = Some(r#"{"X-Entity-Ref-ID":"abc"}"#);

        let headers = extra_headers_for(&relay("smtp.example.com"), Some("smtp.example.com"), raw);
        assert_eq!(headers["X-Entity-Ref-ID"], "abc");

        assert!(extra_headers_for(&relay("other.example.com"), Some("smtp.example.com"), raw).is_empty());
        assert!(extra_headers_for(&relay("smtp.example.com"), None, raw).is_empty());
        assert!(extra_headers_for(&relay("smtp.example.com"), Some("smtp.example.com"), None).is_empty());
    }

    #[test]
    fn test_malformed_extra_headers_ignored() {
        let headers = extra_headers_for(
            &relay("smtp.example.com"),
            Some("smtp.example.com"),
            Some("[1, 2, 3]"),
        );
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn test_send_sanitizes_and_adds_headers() {
        let transport = RecordingTransport::new();
        let mailer = mailer(StaticFlagSource::new(), transport.clone()).with_extra_headers(
            BTreeMap::from([
                ("X-Entity-Ref-ID".to_string(), "relay".to_string()),
                ("X-Mailer".to_string(), "acme".to_string()),
            ]),
        );

        let payload = MessagePayload::new(
            "Acme <noreply@acme.io>",
            "jane@example.com\r\n",
            "Hi &amp; welcome",
            "<p>Hi</p>",
        )
        .with_header("X-Entity-Ref-ID", "payload");

        let outcome = mailer.send(payload).await.unwrap();
        assert!(outcome.is_sent());

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@example.com");
        assert_eq!(sent[0].subject, "Hi & welcome");
        assert_eq!(sent[0].extra_headers["X-Entity-Ref-ID"], "payload");
        assert_eq!(sent[0].extra_headers["X-Mailer"], "acme");
    }

    #[tokio::test]
    async fn test_kill_switch_never_reaches_transport() {
        let transport = RecordingTransport::new();
        let mailer = mailer(
            StaticFlagSource::with_disabled([EMAILS_FEATURE]),
            transport.clone(),
        );

        let outcome = mailer
            .send(MessagePayload::new("a@x.io", "b@y.io", "Hi", "<p>Hi</p>"))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            SendOutcome::Skipped {
                reason: SkipReason::KillSwitch
            }
        ));
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let mailer = mailer(
            StaticFlagSource::new(),
            RecordingTransport::failing("connection refused"),
        );

        let err = mailer
            .send(MessagePayload::new("a@x.io", "b@y.io", "Hi", "<p>Hi</p>"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_skipped_verification_is_ok() {
        let transport = RecordingTransport::new();
        let mailer = mailer(StaticFlagSource::new(), transport.clone());

        mailer
            .send_verification_link("+15551234567@sms.example.com", "https://wrong-host/verify")
            .await
            .unwrap();
        assert_eq!(transport.sent_count().await, 0);
    }

    #[test]
    fn test_debug_lists_channel() {
        let mailer = mailer(StaticFlagSource::new(), RecordingTransport::new());
        let rendered = format!("{:?}", mailer);
        assert!(rendered.contains("local_relay"));
    }
}
