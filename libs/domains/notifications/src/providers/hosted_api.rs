//! Hosted HTTP delivery API (Resend-compatible JSON).

use super::EmailTransport;
use crate::channel::HostedApiConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{MessagePayload, SendReceipt};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Hosted API provider.
pub struct HostedApiProvider {
    config: HostedApiConfig,
    client: Client,
}

impl HostedApiProvider {
    pub fn new(config: HostedApiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

// Hosted API request/response structures

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<&'a BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

#[async_trait]
impl EmailTransport for HostedApiProvider {
    async fn send(&self, payload: &MessagePayload) -> NotificationResult<SendReceipt> {
        let request = SendRequest {
            from: &payload.from,
            to: [&payload.to],
            subject: &payload.subject,
            html: &payload.html,
            text: payload.text.as_deref(),
            headers: (!payload.extra_headers.is_empty()).then_some(&payload.extra_headers),
        };

        debug!(
            subject = %payload.subject,
            header_count = payload.extra_headers.len(),
            "Sending email via hosted API"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.bearer_token.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            // The id is advisory; an empty or odd body still means accepted.
            let message_id = serde_json::from_str::<SendResponse>(&body)
                .ok()
                .and_then(|r| r.id);
            debug!(message_id = ?message_id, "Hosted API accepted message");
            return Ok(SendReceipt::new(message_id));
        }

        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| status.to_string());

        Err(NotificationError::ProviderRejected {
            status: status.as_u16(),
            message,
        })
    }

    fn name(&self) -> &'static str {
        "hosted_api"
    }
}
