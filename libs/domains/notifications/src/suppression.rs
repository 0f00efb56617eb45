//! Policy checks that stop a send before any channel is touched.

use crate::error::NotificationResult;
use crate::flags::{FeatureFlagSource, EMAILS_FEATURE};
use crate::models::SkipReason;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Placeholder addresses minted for phone-only accounts, e.g. `+15551234567@sms.example.com`.
pub const DEFAULT_SYNTHETIC_PATTERN: &str = r"(?i)^\+?[0-9]+@sms\.[a-z0-9.-]+$";

static DEFAULT_SYNTHETIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_SYNTHETIC_PATTERN).unwrap());

/// Decides whether a message should be skipped.
///
/// The kill switch is evaluated first and is re-read on every call; the
/// synthetic-recipient pattern is compiled once.
#[derive(Clone)]
pub struct SuppressionGuard {
    flags: Arc<dyn FeatureFlagSource>,
    synthetic: Regex,
}

impl SuppressionGuard {
    pub fn new(flags: Arc<dyn FeatureFlagSource>, synthetic: Regex) -> Self {
        Self { flags, synthetic }
    }

    /// Guard with the built-in synthetic-recipient pattern.
    pub fn with_default_pattern(flags: Arc<dyn FeatureFlagSource>) -> Self {
        Self::new(flags, default_pattern())
    }

    /// Reads `EMAIL_SYNTHETIC_RECIPIENT_PATTERN`. An override that does not
    /// compile is a configuration error.
    pub fn from_env(flags: Arc<dyn FeatureFlagSource>) -> NotificationResult<Self> {
        let synthetic = match core_config::env_optional("EMAIL_SYNTHETIC_RECIPIENT_PATTERN") {
            Some(pattern) => Regex::new(&pattern)?,
            None => default_pattern(),
        };
        Ok(Self::new(flags, synthetic))
    }

    /// Returns the reason to skip, or `None` when the message may go out.
    pub async fn check(&self, to: &str) -> Option<SkipReason> {
        match self.flags.is_disabled(EMAILS_FEATURE).await {
            Ok(true) => {
                info!("Emails are disabled, skipping send");
                return Some(SkipReason::KillSwitch);
            }
            Ok(false) => {}
            Err(e) => {
                // Fail open: a broken flag backend must not silence auth mail.
                warn!(error = %e, "Could not read emails feature flag, treating as enabled");
            }
        }

        if self.is_synthetic(to) {
            debug!("Recipient is a placeholder address, skipping send");
            return Some(SkipReason::SyntheticRecipient);
        }

        None
    }

    /// True when the bare address matches the synthetic-recipient pattern.
    pub fn is_synthetic(&self, to: &str) -> bool {
        self.synthetic.is_match(bare_address(to))
    }
}

impl std::fmt::Debug for SuppressionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionGuard")
            .field("synthetic", &self.synthetic.as_str())
            .finish_non_exhaustive()
    }
}

fn default_pattern() -> Regex {
    DEFAULT_SYNTHETIC_REGEX.clone()
}

/// `Name <addr@host>` -> `addr@host`; plain addresses are returned trimmed.
pub(crate) fn bare_address(mailbox: &str) -> &str {
    let trimmed = mailbox.trim();
    match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => trimmed[open + 1..close].trim(),
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::flags::{MockFeatureFlagSource, StaticFlagSource};
    use mockall::predicate;

    fn guard_with(source: StaticFlagSource) -> SuppressionGuard {
        SuppressionGuard::with_default_pattern(Arc::new(source))
    }

    #[test]
    fn test_default_pattern_compiles() {
        assert_eq!(default_pattern().as_str(), DEFAULT_SYNTHETIC_PATTERN);
    }

    #[test]
    fn test_bare_address() {
        assert_eq!(bare_address("Jane <jane@x.io>"), "jane@x.io");
        assert_eq!(bare_address("  jane@x.io "), "jane@x.io");
        assert_eq!(bare_address("\"A <b>\" <c@d.io>"), "c@d.io");
    }

    #[tokio::test]
    async fn test_kill_switch_skips() {
        let guard = guard_with(StaticFlagSource::with_disabled([EMAILS_FEATURE]));
        assert_eq!(guard.check("jane@x.io").await, Some(SkipReason::KillSwitch));
    }

    #[tokio::test]
    async fn test_kill_switch_wins_over_synthetic() {
        let guard = guard_with(StaticFlagSource::with_disabled([EMAILS_FEATURE]));
        assert_eq!(
            guard.check("+15551234567@sms.example.com").await,
            Some(SkipReason::KillSwitch)
        );
    }

    #[tokio::test]
    async fn test_synthetic_recipient_skips() {
        let guard = guard_with(StaticFlagSource::new());
        assert_eq!(
            guard.check("+15551234567@sms.example.com").await,
            Some(SkipReason::SyntheticRecipient)
        );
        assert_eq!(
            guard.check("Phone User <15551234567@SMS.Example.com>").await,
            Some(SkipReason::SyntheticRecipient)
        );
        assert_eq!(guard.check("jane@example.com").await, None);
        assert_eq!(guard.check("15551234567@example.com").await, None);
    }

    #[tokio::test]
    async fn test_kill_switch_reread_on_every_call() {
        let source = StaticFlagSource::new();
        let guard = guard_with(source.clone());

        assert_eq!(guard.check("jane@x.io").await, None);
        source.set_disabled(EMAILS_FEATURE, true);
        assert_eq!(guard.check("jane@x.io").await, Some(SkipReason::KillSwitch));
        source.set_disabled(EMAILS_FEATURE, false);
        assert_eq!(guard.check("jane@x.io").await, None);
    }

    #[tokio::test]
    async fn test_flag_source_error_fails_open() {
        let mut flags = MockFeatureFlagSource::new();
        flags
            .expect_is_disabled()
            .with(predicate::eq(EMAILS_FEATURE))
            .times(1)
            .returning(|_| Err(NotificationError::Configuration("flag store down".to_string())));

        let guard = SuppressionGuard::with_default_pattern(Arc::new(flags));
        assert_eq!(guard.check("jane@x.io").await, None);
    }

    #[test]
    fn test_from_env_pattern_override() {
        temp_env::with_var("EMAIL_SYNTHETIC_RECIPIENT_PATTERN", Some(r"@placeholder\.invalid$"), || {
            let guard = SuppressionGuard::from_env(Arc::new(StaticFlagSource::new())).unwrap();
            assert!(guard.is_synthetic("user-1@placeholder.invalid"));
            assert!(!guard.is_synthetic("+15551234567@sms.example.com"));
        });

        temp_env::with_var("EMAIL_SYNTHETIC_RECIPIENT_PATTERN", Some("(unclosed"), || {
            let err = SuppressionGuard::from_env(Arc::new(StaticFlagSource::new())).unwrap_err();
            assert!(matches!(err, NotificationError::Configuration(_)));
        });
    }
}
