//! Feature flag sources for the email kill switch.

use crate::error::NotificationResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Name of the global email kill switch.
pub const EMAILS_FEATURE: &str = "emails";

/// Answers whether a named feature is currently disabled.
///
/// Implementations are consulted on every send, so a flag flipped at
/// runtime takes effect on the next message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeatureFlagSource: Send + Sync {
    async fn is_disabled(&self, feature: &str) -> NotificationResult<bool>;
}

/// Flags backed by environment variables.
///
/// `emails` maps to `EMAILS_DISABLED`; any other feature maps to
/// `FEATURE_<NAME>_DISABLED`. Values like `1`, `true`, `yes` or `on`
/// disable the feature.
#[derive(Debug, Clone, Default)]
pub struct EnvFlagSource;

impl EnvFlagSource {
    pub fn new() -> Self {
        Self
    }

    fn variable_for(feature: &str) -> String {
        if feature == EMAILS_FEATURE {
            "EMAILS_DISABLED".to_string()
        } else {
            format!(
                "FEATURE_{}_DISABLED",
                feature.to_ascii_uppercase().replace(['-', '.', ' '], "_")
            )
        }
    }
}

#[async_trait]
impl FeatureFlagSource for EnvFlagSource {
    async fn is_disabled(&self, feature: &str) -> NotificationResult<bool> {
        Ok(core_config::env_optional(&Self::variable_for(feature))
            .map(|value| core_config::is_truthy(&value))
            .unwrap_or(false))
    }
}

/// In-memory flags, toggled programmatically.
#[derive(Debug, Clone, Default)]
pub struct StaticFlagSource {
    disabled: Arc<RwLock<HashSet<String>>>,
}

impl StaticFlagSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given features disabled.
    pub fn with_disabled<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source = Self::new();
        for feature in features {
            source.set_disabled(feature, true);
        }
        source
    }

    pub fn set_disabled(&self, feature: impl Into<String>, disabled: bool) {
        let mut set = match self.disabled.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let feature = feature.into();
        if disabled {
            set.insert(feature);
        } else {
            set.remove(&feature);
        }
    }
}

#[async_trait]
impl FeatureFlagSource for StaticFlagSource {
    async fn is_disabled(&self, feature: &str) -> NotificationResult<bool> {
        let set = match self.disabled.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(set.contains(feature))
    }
}
