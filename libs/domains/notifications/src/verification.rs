//! Sign-in link emails.

use crate::error::{NotificationError, NotificationResult};
use crate::models::MessagePayload;
use crate::templates::{TemplateEngine, VerificationEmailData};
use core_config::{env_optional, env_or_default, ConfigError, FromEnv};
use url::Url;

const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_APP_NAME: &str = "App";

/// Settings for the sign-in link email.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Canonical application origin. Links are rewritten onto it.
    pub app_url: String,
    pub app_name: String,
    pub from: Option<String>,
    pub from_name: Option<String>,
}

impl FromEnv for VerificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let app_url = env_optional("APP_URL")
            .unwrap_or_else(|| env_or_default("FRONTEND_URL", DEFAULT_APP_URL));

        Url::parse(&app_url).map_err(|e| ConfigError::ParseError {
            key: "APP_URL".to_string(),
            details: e.to_string(),
        })?;

        Ok(Self {
            app_url,
            app_name: env_or_default("APP_NAME", DEFAULT_APP_NAME),
            from: env_optional("EMAIL_FROM"),
            from_name: env_optional("EMAIL_FROM_NAME"),
        })
    }
}

impl VerificationConfig {
    /// Sender for the email: `EMAIL_FROM` (with `EMAIL_FROM_NAME` when set),
    /// otherwise the app name.
    pub fn sender(&self) -> String {
        match (&self.from, &self.from_name) {
            (Some(from), _) if from.contains('<') => from.clone(),
            (Some(from), Some(name)) => format!("{} <{}>", name, from),
            (Some(from), None) => from.clone(),
            (None, _) => self.app_name.clone(),
        }
    }

    /// Build the payload for a sign-in link to `to`.
    ///
    /// `raw_url` is moved onto the canonical origin first, so a link minted
    /// behind a proxy or on an internal host still points at the public app.
    pub fn build_payload(
        &self,
        templates: &TemplateEngine,
        to: &str,
        raw_url: &str,
    ) -> NotificationResult<MessagePayload> {
        let signin_url = rewrite_origin(raw_url, &self.app_url)?;

        let rendered = templates.render_verification(&VerificationEmailData {
            base_url: self.app_url.clone(),
            signin_url,
            email: to.to_string(),
            app_name: self.app_name.clone(),
        })?;

        Ok(MessagePayload::new(self.sender(), to, rendered.subject, rendered.html)
            .with_text(rendered.text))
    }
}

/// Replace the scheme, host and port of `raw_url` with those of
/// `canonical_origin` when the two origins differ. Path, query and fragment
/// are kept.
pub fn rewrite_origin(raw_url: &str, canonical_origin: &str) -> NotificationResult<String> {
    let mut url = Url::parse(raw_url)?;
    let canonical = Url::parse(canonical_origin)?;

    if url.origin() == canonical.origin() {
        return Ok(url.to_string());
    }

    url.set_scheme(canonical.scheme()).map_err(|_| {
        NotificationError::InvalidUrl(format!(
            "cannot move '{}' onto scheme '{}'",
            raw_url,
            canonical.scheme()
        ))
    })?;
    url.set_host(canonical.host_str())?;
    url.set_port(canonical.port()).map_err(|_| {
        NotificationError::InvalidUrl(format!("cannot set port on '{}'", raw_url))
    })?;

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VerificationConfig {
        VerificationConfig {
            app_url: "https://correct-host".to_string(),
            app_name: "Acme".to_string(),
            from: Some("noreply@acme.io".to_string()),
            from_name: Some("Acme".to_string()),
        }
    }

    #[test]
    fn test_rewrite_origin_replaces_host() {
        assert_eq!(
            rewrite_origin("https://wrong-host/verify?x=1", "https://correct-host").unwrap(),
            "https://correct-host/verify?x=1"
        );
    }

    #[test]
    fn test_rewrite_origin_replaces_scheme_and_port() {
        assert_eq!(
            rewrite_origin(
                "http://internal:8080/api/auth/callback/email?token=t&email=a%40b.com#top",
                "https://app.example.com"
            )
            .unwrap(),
            "https://app.example.com/api/auth/callback/email?token=t&email=a%40b.com#top"
        );
        assert_eq!(
            rewrite_origin("https://app.example.com/verify", "http://localhost:3000").unwrap(),
            "http://localhost:3000/verify"
        );
    }

    #[test]
    fn test_rewrite_origin_same_origin_unchanged() {
        assert_eq!(
            rewrite_origin("https://correct-host/verify?x=1", "https://correct-host/ignored").unwrap(),
            "https://correct-host/verify?x=1"
        );
    }

    #[test]
    fn test_rewrite_origin_rejects_garbage() {
        assert!(matches!(
            rewrite_origin("not a url", "https://correct-host"),
            Err(NotificationError::InvalidUrl(_))
        ));
        assert!(matches!(
            rewrite_origin("https://wrong-host/verify", "::"),
            Err(NotificationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_sender() {
        assert_eq!(config().sender(), "Acme <noreply@acme.io>");

        let bare = VerificationConfig {
            from_name: None,
            ..config()
        };
        assert_eq!(bare.sender(), "noreply@acme.io");

        let preformatted = VerificationConfig {
            from: Some("Support <help@acme.io>".to_string()),
            ..config()
        };
        assert_eq!(preformatted.sender(), "Support <help@acme.io>");

        let missing = VerificationConfig {
            from: None,
            ..config()
        };
        assert_eq!(missing.sender(), "Acme");
    }

    #[test]
    fn test_build_payload() {
        let templates = TemplateEngine::new().unwrap();
        let payload = config()
            .build_payload(&templates, "a@b.com", "https://wrong-host/verify?x=1")
            .unwrap();

        assert_eq!(payload.to, "a@b.com");
        assert_eq!(payload.from, "Acme <noreply@acme.io>");
        assert_eq!(payload.subject, "Your sign-in link for Acme");
        assert!(payload.html.contains("https://correct-host/verify?x=1"));
        assert!(!payload.html.contains("wrong-host"));
        assert!(payload.text.unwrap().contains("https://correct-host/verify?x=1"));
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("APP_URL", None::<&str>),
                ("FRONTEND_URL", Some("https://front.example.com")),
                ("APP_NAME", None),
                ("EMAIL_FROM", Some("noreply@example.com")),
                ("EMAIL_FROM_NAME", None),
            ],
            || {
                let config = VerificationConfig::from_env().unwrap();
                assert_eq!(config.app_url, "https://front.example.com");
                assert_eq!(config.app_name, "App");
                assert_eq!(config.sender(), "noreply@example.com");
            },
        );

        temp_env::with_vars(
            [
                ("APP_URL", Some("  ")),
                ("FRONTEND_URL", Some("")),
                ("APP_NAME", Some(" ")),
            ],
            || {
                let config = VerificationConfig::from_env().unwrap();
                assert_eq!(config.app_url, "http://localhost:3000");
                assert_eq!(config.app_name, "App");
            },
        );

        temp_env::with_vars(
            [("APP_URL", Some("not a url")), ("FRONTEND_URL", None)],
            || {
                assert!(VerificationConfig::from_env().is_err());
            },
        );
    }
}
