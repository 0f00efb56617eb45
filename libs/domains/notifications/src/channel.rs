//! Outbound channel selection.
//!
//! The channel is decided once, at process start, from an [`EmailEnv`]
//! snapshot and never changes afterwards. Selection is total: anything that
//! cannot be assembled into a working hosted-API or relay configuration
//! degrades to the local `sendmail` relay with an error in the log, so a
//! broken mail setup cannot take the whole service down.

use crate::error::{NotificationError, NotificationResult};
use core_config::{env_optional, Environment};
use secrecy::{ExposeSecret, Secret};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

/// Default hosted delivery endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.resend.com/emails";
/// Default local relay binary.
pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";
/// STARTTLS submission port, preferred when nothing else is configured.
pub const SUBMISSION_PORT: u16 = 587;
/// Implicit-TLS submission port.
pub const IMPLICIT_TLS_PORT: u16 = 465;
/// Default relay socket timeout.
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// Environment snapshot
// ============================================================================

/// Raw mail configuration as read from the environment.
///
/// Blank variables are treated as unset. Secrets are wrapped so that
/// `Debug` output and logs never show them.
#[derive(Debug, Clone, Default)]
pub struct EmailEnv {
    /// `EMAIL_API_KEY`, falling back to `RESEND_API_KEY`.
    pub api_key: Option<Secret<String>>,
    /// `EMAIL_API_URL`.
    pub api_url: Option<String>,
    /// `EMAIL_SERVER`, a `smtp://` or `smtps://` connection string.
    pub server_url: Option<Secret<String>>,
    /// `EMAIL_SERVER_HOST`.
    pub server_host: Option<String>,
    /// `EMAIL_SERVER_PORT`.
    pub server_port: Option<String>,
    /// `EMAIL_SERVER_USER`.
    pub server_user: Option<String>,
    /// `EMAIL_SERVER_PASSWORD`.
    pub server_password: Option<Secret<String>>,
    /// `EMAIL_RELAY_TIMEOUT_MS`.
    pub relay_timeout_ms: Option<String>,
    /// `SENDMAIL_PATH`.
    pub sendmail_path: Option<String>,
    /// `EMAIL_FROM`.
    pub from: Option<String>,
    /// `EMAIL_FROM_NAME`.
    pub from_name: Option<String>,
    /// True only when `APP_ENV` is explicitly `development`.
    pub dev_mode: bool,
}

impl EmailEnv {
    /// Read the mail configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            api_key: env_optional("EMAIL_API_KEY")
                .or_else(|| env_optional("RESEND_API_KEY"))
                .map(Secret::new),
            api_url: env_optional("EMAIL_API_URL"),
            server_url: env_optional("EMAIL_SERVER").map(Secret::new),
            server_host: env_optional("EMAIL_SERVER_HOST"),
            server_port: env_optional("EMAIL_SERVER_PORT"),
            server_user: env_optional("EMAIL_SERVER_USER"),
            server_password: env_optional("EMAIL_SERVER_PASSWORD").map(Secret::new),
            relay_timeout_ms: env_optional("EMAIL_RELAY_TIMEOUT_MS"),
            sendmail_path: env_optional("SENDMAIL_PATH"),
            from: env_optional("EMAIL_FROM"),
            from_name: env_optional("EMAIL_FROM_NAME"),
            dev_mode: Environment::explicit_from_env().is_some_and(|env| env.is_development()),
        }
    }
}

// ============================================================================
// Channel configuration
// ============================================================================

/// Hosted HTTP delivery API.
#[derive(Debug, Clone)]
pub struct HostedApiConfig {
    pub endpoint: String,
    pub bearer_token: Secret<String>,
    pub from_address: Option<String>,
}

/// Relay login.
#[derive(Debug, Clone)]
pub struct RelayCredentials {
    pub username: String,
    pub password: Secret<String>,
}

/// Direct SMTP relay connection.
#[derive(Debug, Clone)]
pub struct SmtpRelayConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS from the first byte.
    pub secure: bool,
    pub credentials: Option<RelayCredentials>,
    /// Refuse to continue when the server does not offer STARTTLS.
    pub require_starttls: bool,
    /// Skip certificate validation. Only ever set in explicit development mode.
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

/// Last-resort `sendmail` binary.
#[derive(Debug, Clone)]
pub struct LocalRelayConfig {
    pub binary_path: PathBuf,
}

/// The one outbound channel active for this process.
#[derive(Debug, Clone)]
pub enum ChannelConfig {
    HostedApi(HostedApiConfig),
    SmtpRelay(SmtpRelayConfig),
    LocalRelay(LocalRelayConfig),
}

impl ChannelConfig {
    /// Stable label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelConfig::HostedApi(_) => "hosted_api",
            ChannelConfig::SmtpRelay(_) => "smtp_relay",
            ChannelConfig::LocalRelay(_) => "local_relay",
        }
    }

    /// Relay host, when the channel is an SMTP relay.
    pub fn relay_host(&self) -> Option<&str> {
        match self {
            ChannelConfig::SmtpRelay(relay) => Some(&relay.host),
            _ => None,
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Decide the outbound channel. Called once at startup.
///
/// Priority: hosted-API token, then `EMAIL_SERVER`, then discrete
/// `EMAIL_SERVER_*` variables, then the local relay.
pub fn select_channel(env: &EmailEnv) -> ChannelConfig {
    match try_select_channel(env) {
        Ok(channel) => channel,
        Err(err) => {
            error!(
                error = %err,
                "Email channel configuration is unusable, falling back to local relay"
            );
            local_relay(env)
        }
    }
}

fn try_select_channel(env: &EmailEnv) -> NotificationResult<ChannelConfig> {
    if let Some(token) = &env.api_key {
        return hosted_api(env, token);
    }

    if let Some(connection) = &env.server_url {
        let relay = relay_from_connection_string(connection.expose_secret(), env)?;
        log_relay("EMAIL_SERVER", &relay, env);
        return Ok(ChannelConfig::SmtpRelay(relay));
    }

    if let Some(host) = &env.server_host {
        let relay = relay_from_parts(host, env)?;
        log_relay("EMAIL_SERVER_HOST", &relay, env);
        return Ok(ChannelConfig::SmtpRelay(relay));
    }

    Ok(local_relay(env))
}

fn hosted_api(env: &EmailEnv, token: &Secret<String>) -> NotificationResult<ChannelConfig> {
    let endpoint = env
        .api_url
        .clone()
        .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
    Url::parse(&endpoint).map_err(|e| {
        NotificationError::Configuration(format!("EMAIL_API_URL is not a valid URL: {}", e))
    })?;

    if env.from.is_none() {
        error!("Hosted email API token set but EMAIL_FROM is missing - emails will fail");
    }

    info!(
        channel = "hosted_api",
        endpoint = %endpoint,
        from = env.from.as_deref().unwrap_or("(missing)"),
        from_name = env.from_name.as_deref().unwrap_or("(missing)"),
        "Using hosted email API"
    );

    Ok(ChannelConfig::HostedApi(HostedApiConfig {
        endpoint,
        bearer_token: token.clone(),
        from_address: env.from.clone(),
    }))
}

/// Parse `smtp://[user:pass@]host[:port][?requireTLS=true]` or `smtps://…`.
fn relay_from_connection_string(raw: &str, env: &EmailEnv) -> NotificationResult<SmtpRelayConfig> {
    // The parse error text never includes the input, so the password stays out of logs.
    let url = Url::parse(raw).map_err(|e| {
        NotificationError::Configuration(format!("EMAIL_SERVER is not a valid URL: {}", e))
    })?;

    let secure = match url.scheme() {
        "smtp" => false,
        "smtps" => true,
        other => {
            return Err(NotificationError::Configuration(format!(
                "EMAIL_SERVER has unsupported scheme '{}', expected smtp or smtps",
                other
            )))
        }
    };

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| NotificationError::Configuration("EMAIL_SERVER has no host".to_string()))?
        .to_string();

    let port = url
        .port()
        .unwrap_or(if secure { IMPLICIT_TLS_PORT } else { SUBMISSION_PORT });

    let username = percent_decode(url.username());
    let password = url.password().map(percent_decode);
    let credentials = pair_credentials(
        Some(username).filter(|u| !u.is_empty()),
        password.filter(|p| !p.is_empty()).map(Secret::new),
        "EMAIL_SERVER",
    )?;

    let require_starttls = !secure
        && url.query_pairs().any(|(key, value)| {
            (key == "requireTLS" || key == "require_tls") && core_config::is_truthy(&value)
        });

    Ok(SmtpRelayConfig {
        host,
        port,
        secure,
        credentials,
        require_starttls,
        accept_invalid_certs: false,
        timeout: relay_timeout(env)?,
    })
}

fn relay_from_parts(host: &str, env: &EmailEnv) -> NotificationResult<SmtpRelayConfig> {
    let port = match &env.server_port {
        Some(raw) => raw.parse::<u16>().map_err(|e| {
            NotificationError::Configuration(format!("EMAIL_SERVER_PORT '{}' is invalid: {}", raw, e))
        })?,
        None => SUBMISSION_PORT,
    };

    let credentials = pair_credentials(
        env.server_user.clone(),
        env.server_password.clone(),
        "EMAIL_SERVER_USER/EMAIL_SERVER_PASSWORD",
    )?;

    Ok(SmtpRelayConfig {
        host: host.to_string(),
        port,
        secure: port == IMPLICIT_TLS_PORT,
        credentials,
        require_starttls: false,
        accept_invalid_certs: env.dev_mode,
        timeout: relay_timeout(env)?,
    })
}

/// Credentials are all-or-nothing: one half without the other is a broken setup.
fn pair_credentials(
    username: Option<String>,
    password: Option<Secret<String>>,
    source: &str,
) -> NotificationResult<Option<RelayCredentials>> {
    match (username, password) {
        (Some(username), Some(password)) => Ok(Some(RelayCredentials { username, password })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(NotificationError::Configuration(format!(
            "{}: username set without password",
            source
        ))),
        (None, Some(_)) => Err(NotificationError::Configuration(format!(
            "{}: password set without username",
            source
        ))),
    }
}

fn relay_timeout(env: &EmailEnv) -> NotificationResult<Duration> {
    let millis = match &env.relay_timeout_ms {
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            NotificationError::Configuration(format!(
                "EMAIL_RELAY_TIMEOUT_MS '{}' is invalid: {}",
                raw, e
            ))
        })?,
        None => DEFAULT_RELAY_TIMEOUT_MS,
    };
    Ok(Duration::from_millis(millis))
}

fn local_relay(env: &EmailEnv) -> ChannelConfig {
    let binary_path = PathBuf::from(
        env.sendmail_path
            .as_deref()
            .unwrap_or(DEFAULT_SENDMAIL_PATH),
    );

    warn!(
        channel = "local_relay",
        path = %binary_path.display(),
        missing = "EMAIL_API_KEY, EMAIL_SERVER, EMAIL_SERVER_HOST",
        "No hosted API or relay configured. Falling back to sendmail (likely to fail in containers)"
    );

    ChannelConfig::LocalRelay(LocalRelayConfig { binary_path })
}

fn log_relay(source: &str, relay: &SmtpRelayConfig, env: &EmailEnv) {
    if env.from.is_none() {
        warn!(source = source, "EMAIL_FROM is not set; payloads must carry their own sender");
    }
    if relay.accept_invalid_certs {
        warn!(host = %relay.host, "Relay certificate validation disabled (APP_ENV=development)");
    }

    info!(
        channel = "smtp_relay",
        source = source,
        host = %relay.host,
        port = relay.port,
        secure = relay.secure,
        require_starttls = relay.require_starttls,
        authenticated = relay.credentials.is_some(),
        "Using SMTP relay"
    );
}

/// Percent-decode URL user info. Invalid UTF-8 is replaced rather than rejected.
fn percent_decode(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}
