//! Mail operator tool
//!
//! Sends a single message through whatever channel the environment selects,
//! so an operator can check a deployment's mail setup end to end.
//!
//! ## Flow
//!
//! ```text
//! Environment (EMAIL_*, APP_*)
//!   ↓
//! Mailer::from_env (channel selected once)
//!   ↓
//! send / send_verification_link
//!   ↓
//! Outcome printed, non-zero exit on failure
//! ```

use clap::Parser;
use core_config::Environment;
use domain_notifications::{ChannelConfig, EnvFlagSource, Mailer, MessagePayload, SendOutcome};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Send a test email through the configured channel.
#[derive(Debug, Parser)]
#[command(name = "send_test_email", version)]
pub struct Cli {
    /// Recipient address.
    pub to: String,

    /// Subject for the plain test message.
    #[arg(long, default_value = "Test email")]
    pub subject: String,

    /// Send a sign-in link email for this URL instead of the plain message.
    #[arg(long, value_name = "URL")]
    pub verify_url: Option<String>,

    /// Override the dispatch deadline (EMAIL_SEND_TIMEOUT_MS).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Print the Prometheus metrics snapshot after sending.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Run the tool.
///
/// # Errors
///
/// Returns an error if the mail configuration cannot be loaded or the send
/// fails. A skipped send is not an error.
pub async fn run(cli: Cli) -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    observability::init_metrics().wrap_err("Failed to install metrics recorder")?;

    let mut mailer = Mailer::from_env(Arc::new(EnvFlagSource::new()))
        .wrap_err("Failed to configure mailer")?;
    if let Some(ms) = cli.timeout_ms {
        mailer = mailer.with_timeout(Duration::from_millis(ms));
    }

    info!(environment = ?environment, channel = mailer.channel().name(), "Mailer ready");

    println!("Channel: {}", describe_channel(mailer.channel()));
    println!("Sender:  {}", mailer.verification_sender());
    println!("Timeout: {}ms", mailer.timeout().as_millis());
    println!("Sending to: {}", cli.to);

    let result = match &cli.verify_url {
        Some(url) => mailer
            .send_verification_link(&cli.to, url)
            .await
            .map(|()| "sign-in link sent (or skipped by policy)".to_string()),
        None => {
            let payload = MessagePayload::new(
                mailer.verification_sender(),
                cli.to.as_str(),
                cli.subject.as_str(),
                "<h1>Hello!</h1><p>This is a test email from the mailer tool.</p>",
            )
            .with_text("Hello! This is a test email from the mailer tool.");

            mailer.send(payload).await.map(|outcome| describe_outcome(&outcome))
        }
    };

    if cli.print_metrics {
        println!("{}", observability::render_metrics());
    }

    match result {
        Ok(summary) => {
            println!("Result: {}", summary);
            Ok(())
        }
        Err(e) => {
            println!("Result: failed ({})", e.user_message());
            Err(e).wrap_err("Email was not sent")
        }
    }
}

/// One-line channel summary. Never includes secrets.
pub fn describe_channel(channel: &ChannelConfig) -> String {
    match channel {
        ChannelConfig::HostedApi(api) => format!(
            "hosted_api ({}, token set: yes, from: {})",
            api.endpoint,
            api.from_address.as_deref().unwrap_or("(missing)")
        ),
        ChannelConfig::SmtpRelay(relay) => format!(
            "smtp_relay ({}:{}, implicit tls: {}, starttls required: {}, auth: {})",
            relay.host,
            relay.port,
            relay.secure,
            relay.require_starttls,
            if relay.credentials.is_some() { "yes" } else { "no" }
        ),
        ChannelConfig::LocalRelay(local) => {
            format!("local_relay ({})", local.binary_path.display())
        }
    }
}

fn describe_outcome(outcome: &SendOutcome) -> String {
    match outcome {
        SendOutcome::Sent {
            provider_message_id: Some(id),
        } => format!("sent (id {})", id),
        SendOutcome::Sent {
            provider_message_id: None,
        } => "sent".to_string(),
        SendOutcome::Skipped { reason } => format!("skipped ({})", reason),
        SendOutcome::Failed { cause } => format!("failed ({})", cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use domain_notifications::SkipReason;
    use domain_notifications::channel::{HostedApiConfig, RelayCredentials, SmtpRelayConfig};
    use secrecy::Secret;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "send_test_email",
            "jane@example.com",
            "--verify-url",
            "https://app.example.com/verify?x=1",
            "--timeout-ms",
            "5000",
        ]);
        assert_eq!(cli.to, "jane@example.com");
        assert_eq!(cli.subject, "Test email");
        assert_eq!(cli.verify_url.as_deref(), Some("https://app.example.com/verify?x=1"));
        assert_eq!(cli.timeout_ms, Some(5000));
        assert!(!cli.print_metrics);
    }

    #[test]
    fn test_describe_channel_hides_secrets() {
        let hosted = ChannelConfig::HostedApi(HostedApiConfig {
            endpoint: "https://api.resend.com/emails".to_string(),
            bearer_token: Secret::new("re_secret_token".to_string()),
            from_address: None,
        });
        let summary = describe_channel(&hosted);
        assert!(summary.contains("token set: yes"));
        assert!(summary.contains("(missing)"));
        assert!(!summary.contains("re_secret_token"));

        let relay = ChannelConfig::SmtpRelay(SmtpRelayConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            secure: true,
            credentials: Some(RelayCredentials {
                username: "mailer".to_string(),
                password: Secret::new("hunter2".to_string()),
            }),
            require_starttls: false,
            accept_invalid_certs: false,
            timeout: Duration::from_secs(30),
        });
        let summary = describe_channel(&relay);
        assert!(summary.starts_with("smtp_relay (smtp.example.com:465"));
        assert!(summary.contains("auth: yes"));
        assert!(!summary.contains("hunter2"));
    }

    #[test]
    fn test_describe_outcome() {
        assert_eq!(
            describe_outcome(&SendOutcome::Sent {
                provider_message_id: Some("msg_1".to_string())
            }),
            "sent (id msg_1)"
        );
        assert_eq!(
            describe_outcome(&SendOutcome::Skipped {
                reason: SkipReason::KillSwitch
            }),
            "skipped (kill_switch)"
        );
    }
}
