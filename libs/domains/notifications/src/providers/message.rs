//! RFC 5322 message assembly shared by the relay transports.

use crate::error::{NotificationError, NotificationResult};
use crate::models::MessagePayload;
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::Message;

/// Build a lettre `Message` from a sanitized payload.
///
/// With a text alternative the body is `multipart/alternative`, otherwise a
/// single HTML part.
pub fn build_message(payload: &MessagePayload) -> NotificationResult<Message> {
    let from: Mailbox = payload.from.parse()?;
    let to: Mailbox = payload.to.parse()?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(payload.subject.as_str());

    for (name, value) in &payload.extra_headers {
        let header_name = HeaderName::new_from_ascii(name.clone()).map_err(|_| {
            NotificationError::Transport(format!("Invalid header name: {}", name))
        })?;
        builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
    }

    let message = match &payload.text {
        Some(text) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(payload.html.clone()),
                ),
        )?,
        None => builder.singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(payload.html.clone()),
        )?,
    };

    Ok(message)
}
