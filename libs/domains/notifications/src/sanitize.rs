//! Header-safe normalisation of outbound payloads.
//!
//! Every value that ends up in a mail header passes through here right
//! before dispatch. The functions are total: whatever comes in, something
//! header-safe comes out.

use crate::models::MessagePayload;
use std::collections::BTreeMap;

/// Characters that force a display name into a quoted string.
const SPECIALS: &[char] = &[',', ';', ':', '@', '"', '(', ')', '[', ']', '\\'];

/// Return a copy of `payload` with every header field made safe.
///
/// Bodies are passed through untouched.
pub fn sanitize(payload: MessagePayload) -> MessagePayload {
    MessagePayload {
        from: sanitize_mailbox(&payload.from),
        to: sanitize_mailbox(&payload.to),
        subject: sanitize_subject(&payload.subject),
        html: payload.html,
        text: payload.text,
        extra_headers: sanitize_headers(payload.extra_headers),
    }
}

/// Normalise `addr@host` or `Display Name <addr@host>`.
pub fn sanitize_mailbox(raw: &str) -> String {
    let (display, address) = match raw.rfind('<') {
        Some(open) => {
            let rest = &raw[open + 1..];
            let address = rest.split('>').next().unwrap_or(rest);
            (Some(&raw[..open]), address)
        }
        None => (None, raw),
    };

    let address: String = address
        .chars()
        .filter(|c| !is_unsafe(*c) && !c.is_whitespace() && *c != '<' && *c != '>')
        .collect();

    match display.map(sanitize_display_name).filter(|name| !name.is_empty()) {
        Some(name) => format!("{} <{}>", name, address),
        None => address,
    }
}

/// Strip control characters, decode HTML entities, strip again.
///
/// Control characters become spaces so adjacent words stay apart.
pub fn sanitize_subject(raw: &str) -> String {
    let decoded = decode_html_entities(&replace_control(raw));
    replace_control(&decoded).trim().to_string()
}

/// Drop headers with unusable names and strip control characters from values.
pub fn sanitize_headers(headers: BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .into_iter()
        .filter(|(name, _)| is_valid_header_name(name))
        .map(|(name, value)| {
            let value: String = value.chars().filter(|c| !c.is_control()).collect();
            (name, value.trim().to_string())
        })
        .collect()
}

/// Header field names are visible ASCII other than `:`.
pub fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

fn sanitize_display_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !is_unsafe(*c) && *c != '<' && *c != '>')
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let was_quoted = collapsed.len() >= 2 && collapsed.starts_with('"') && collapsed.ends_with('"');
    let name = if was_quoted {
        unescape_quoted(&collapsed[1..collapsed.len() - 1])
    } else {
        collapsed.trim_matches('"').to_string()
    };
    let name = name.trim();

    if name.contains(SPECIALS) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        name.to_string()
    }
}

/// Control characters and bidi overrides, neither of which belongs in a mailbox.
fn is_unsafe(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{061c}' | '\u{200e}' | '\u{200f}' | '\u{202a}'..='\u{202e}' | '\u{2066}'..='\u{2069}'
        )
}

fn unescape_quoted(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn replace_control(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Decode named (full HTML5 table) and numeric HTML entities.
///
/// Anything that is not a known entity is kept as-is.
pub fn decode_html_entities(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}
