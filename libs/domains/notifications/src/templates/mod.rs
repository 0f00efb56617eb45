//! Email template rendering engine.
//!
//! This module provides Handlebars-based template rendering for the
//! sign-in link email.

use crate::error::NotificationResult;
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Rendered email content.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    /// HTML body content.
    pub html: String,
    /// Plain text body content.
    pub text: String,
    /// Email subject line.
    pub subject: String,
}

/// Data for the sign-in link email.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationEmailData {
    /// Canonical application origin, used for the logo and footer links.
    pub base_url: String,
    /// The link the recipient clicks. Inserted unescaped, so it must be a
    /// serialized `url::Url` (which never contains quotes or angle brackets).
    pub signin_url: String,
    /// Recipient address, shown in the body.
    pub email: String,
    /// Product name.
    pub app_name: String,
}

/// Template engine for rendering email templates.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
}

impl TemplateEngine {
    /// Create a new template engine with all templates registered.
    pub fn new() -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        handlebars.register_template_string("verification_html", VERIFICATION_HTML_TEMPLATE)?;
        handlebars.register_template_string("verification_text", VERIFICATION_TEXT_TEMPLATE)?;

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    /// Render a template with the given data.
    fn render<T: Serialize>(&self, template_name: &str, data: &T) -> NotificationResult<String> {
        Ok(self.handlebars.render(template_name, data)?)
    }

    /// Render the sign-in link email.
    pub fn render_verification(
        &self,
        data: &VerificationEmailData,
    ) -> NotificationResult<RenderedEmail> {
        debug!(app = %data.app_name, "Rendering verification email");

        let html = self.render("verification_html", data)?;
        let text = self.render("verification_text", data)?;

        Ok(RenderedEmail {
            html,
            text,
            subject: format!("Your sign-in link for {}", data.app_name),
        })
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

// ============================================================================
// Email Templates
// ============================================================================

const VERIFICATION_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Sign in to {{app_name}}</title>
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background-color: #f4f4f5;">
  <table role="presentation" width="100%" cellspacing="0" cellpadding="0" style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
    <tr>
      <td style="background-color: #ffffff; border-radius: 8px; padding: 40px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
        <table width="100%" cellspacing="0" cellpadding="0">
          <tr>
            <td style="text-align: center; padding-bottom: 30px;">
              <a href="{{base_url}}" style="color: #18181b; font-size: 20px; font-weight: 600; text-decoration: none;">{{app_name}}</a>
            </td>
          </tr>
        </table>
        <h1 style="color: #18181b; font-size: 24px; font-weight: 600; margin: 0 0 16px 0; text-align: center;">
          Sign in to {{app_name}}
        </h1>
        <p style="color: #52525b; font-size: 16px; line-height: 24px; margin: 0 0 24px 0; text-align: center;">
          Click the button below to sign in as <strong>{{email}}</strong>.
        </p>
        <table width="100%" cellspacing="0" cellpadding="0">
          <tr>
            <td style="text-align: center;">
              <a href="{{{signin_url}}}" style="display: inline-block; background-color: #2563eb; color: #ffffff; font-size: 16px; font-weight: 500; padding: 12px 32px; text-decoration: none; border-radius: 6px;">
                Sign in
              </a>
            </td>
          </tr>
        </table>
        <p style="color: #71717a; font-size: 12px; text-align: center; margin: 24px 0 0 0;">
          If the button does not work, copy this link into your browser:<br>
          <a href="{{{signin_url}}}" style="color: #2563eb; word-break: break-all;">{{{signin_url}}}</a>
        </p>
        <p style="color: #71717a; font-size: 12px; text-align: center; margin: 24px 0 0 0;">
          If you did not request this email, you can safely ignore it.
        </p>
      </td>
    </tr>
  </table>
</body>
</html>"#;

const VERIFICATION_TEXT_TEMPLATE: &str = r#"Sign in to {{{app_name}}}

Use the link below to sign in as {{{email}}}:

{{{signin_url}}}

If you did not request this email, you can safely ignore it.

---
{{{base_url}}}"#;
