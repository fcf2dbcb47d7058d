//! Message body handling: transport decoding and body location.
//!
//! Provider messages carry their bodies base64url-encoded (no padding).
//! [`EncodedBody`] is the reversible transport form: decoding then re-encoding
//! reproduces the original encoded text exactly.
//!
//! [`find_body_text`] walks a payload tree and returns the first usable
//! decoded body, honoring a part-preference order: plain text before markup
//! for code extraction, markup first when an anchor-aware link matcher wants
//! real `href` attributes.

use crate::error::BodyDecodeError;
use crate::provider::MessagePayload;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// A transport-encoded (base64url, unpadded) message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody(String);

impl EncodedBody {
    /// Wraps raw transport-encoded text as received from the provider.
    #[must_use]
    pub fn from_raw(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encodes plain text into the transport form.
    #[must_use]
    pub fn encode(text: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(text.as_bytes()))
    }

    /// Decodes the transport form back to text.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64url or the decoded
    /// bytes are not UTF-8.
    pub fn decode(&self) -> Result<String, BodyDecodeError> {
        let bytes = URL_SAFE_NO_PAD.decode(self.0.as_bytes())?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Returns the encoded text as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Order in which leaf parts of a multipart payload are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartPreference {
    /// `text/plain` parts before `text/html` parts.
    PlainFirst,
    /// `text/html` parts before `text/plain` parts.
    HtmlFirst,
}

impl PartPreference {
    fn mime_order(self) -> [&'static str; 2] {
        match self {
            PartPreference::PlainFirst => ["text/plain", "text/html"],
            PartPreference::HtmlFirst => ["text/html", "text/plain"],
        }
    }
}

/// A located, decoded message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyText {
    /// The decoded body text.
    pub text: String,
    /// Whether the text is HTML markup (flatten before plain-text matching).
    pub is_html: bool,
}

/// Locates and decodes the first usable body in a payload tree.
///
/// A single-part message uses its own data directly. A multipart message is
/// scanned in `preference` order, stopping at the first non-empty decoded
/// body; nested multiparts are recursed. Parts that fail to decode during a
/// multipart scan are logged and skipped; a single-part body that fails to
/// decode is an error, since there is nothing else to fall back to.
///
/// Returns `Ok(None)` when the message has no usable textual body.
///
/// # Errors
///
/// Returns an error only for an undecodable single-part body.
pub fn find_body_text(
    payload: &MessagePayload,
    preference: PartPreference,
) -> Result<Option<BodyText>, BodyDecodeError> {
    if payload.parts.is_empty() {
        let Some(data) = &payload.data else {
            return Ok(None);
        };
        let text = data.decode()?;
        if text.is_empty() {
            return Ok(None);
        }
        return Ok(Some(BodyText {
            is_html: is_html_mime(&payload.mime_type),
            text,
        }));
    }

    for wanted in preference.mime_order() {
        for part in &payload.parts {
            if !part.mime_type.eq_ignore_ascii_case(wanted) {
                continue;
            }
            let Some(data) = &part.data else { continue };
            match data.decode() {
                Ok(text) if !text.is_empty() => {
                    return Ok(Some(BodyText {
                        is_html: is_html_mime(&part.mime_type),
                        text,
                    }));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(mime_type = %part.mime_type, error = %e, "Skipping undecodable part");
                }
            }
        }
    }

    // No matching leaf; descend into nested multiparts
    for part in &payload.parts {
        if !part.parts.is_empty() {
            if let Some(body) = find_body_text(part, preference)? {
                return Ok(Some(body));
            }
        }
    }

    Ok(None)
}

fn is_html_mime(mime_type: &str) -> bool {
    mime_type.eq_ignore_ascii_case("text/html")
}

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Flattens HTML markup to plain text for pattern matching.
///
/// Tags are replaced by spaces, common entities are unescaped, and runs of
/// whitespace collapse to single spaces. This is deliberately not a full HTML
/// parser; it only has to make body text scannable.
///
/// # Example
///
/// ```
/// use mail_relay::body::strip_html;
///
/// let text = strip_html("<p>Your code is <b>4821</b> &amp; expires soon.</p>");
/// assert_eq!(text, "Your code is 4821 & expires soon.");
/// ```
#[must_use]
pub fn strip_html(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
