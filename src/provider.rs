//! Mail-provider contract.
//!
//! The provider's authentication and API transport live outside this crate;
//! what remains here is the two-call surface the extractor consumes: a bounded
//! search returning message ids, and a full fetch of one message as a
//! structured payload tree with transport-encoded bodies.
//!
//! Implement [`MailProvider`] against your provider SDK; tests use in-crate
//! stubs.

use crate::body::EncodedBody;
use async_trait::async_trait;
use thiserror::Error;

/// Opaque provider-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(
    /// The raw id string as returned by the provider.
    pub String,
);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Search constraints for locating provider messages.
///
/// Rendered to the provider's query syntax by [`render`](Self::render):
/// sender, quoted recipient, and optional quoted subject terms.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Required sender address.
    pub sender: String,
    /// Mailbox address the message was delivered to.
    pub recipient: String,
    /// Subject keywords, quoted as one phrase when present.
    pub subject_terms: Option<String>,
}

impl SearchQuery {
    /// Renders the query in the provider's search syntax.
    ///
    /// # Example
    ///
    /// ```
    /// use mail_relay::provider::SearchQuery;
    ///
    /// let query = SearchQuery {
    ///     sender: "info@account.netflix.com".into(),
    ///     recipient: "user@example.com".into(),
    ///     subject_terms: Some("reset your password".into()),
    /// };
    /// assert_eq!(
    ///     query.render(),
    ///     r#"from:info@account.netflix.com "user@example.com" subject:"reset your password""#
    /// );
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut query = format!(r#"from:{} "{}""#, self.sender, self.recipient);
        if let Some(terms) = &self.subject_terms {
            query.push_str(&format!(r#" subject:"{terms}""#));
        }
        query
    }
}

/// One header of a provider message.
#[derive(Debug, Clone)]
pub struct Header {
    /// Header name, e.g. `Subject`.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// A message payload node: either a leaf part carrying body data, or a
/// multipart container with nested parts.
///
/// Mirrors the structured form providers return from a full message fetch.
#[derive(Debug, Clone, Default)]
pub struct MessagePayload {
    /// MIME type, e.g. `text/plain`, `text/html`, `multipart/alternative`.
    pub mime_type: String,
    /// Transport-encoded body data. Empty on container parts.
    pub data: Option<EncodedBody>,
    /// Nested parts for multipart payloads.
    pub parts: Vec<MessagePayload>,
}

impl MessagePayload {
    /// Creates a leaf part with the given MIME type and plain-text content,
    /// transport-encoding it the way a provider would.
    #[must_use]
    pub fn leaf(mime_type: &str, text: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: Some(EncodedBody::encode(text)),
            parts: Vec::new(),
        }
    }

    /// Creates a multipart container over the given parts.
    #[must_use]
    pub fn multipart(mime_type: &str, parts: Vec<MessagePayload>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: None,
            parts,
        }
    }
}

/// A provider message in full form.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message id.
    pub id: MessageId,
    /// Message headers.
    pub headers: Vec<Header>,
    /// Root payload node.
    pub payload: MessagePayload,
}

impl Message {
    /// Returns the value of the first header with the given name,
    /// compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Returns the message subject, if present.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }
}

/// Failure of an upstream provider call (auth, network, provider-side quota).
///
/// Wrapped into [`Error::Provider`](crate::Error::Provider) by the extractor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderCallError {
    /// The provider rejected the crate's credentials.
    #[error("provider authentication failed: {message}")]
    Auth {
        /// Provider-reported detail.
        message: String,
    },

    /// The provider could not be reached or answered with a server error.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Provider-reported detail.
        message: String,
    },

    /// The provider throttled or quota-limited the API call.
    #[error("provider rate limit hit: {message}")]
    RateLimited {
        /// Provider-reported detail.
        message: String,
    },

    /// The requested message id does not exist (e.g. deleted between
    /// search and get).
    #[error("message {id} not found at provider")]
    MissingMessage {
        /// The id that failed to resolve.
        id: String,
    },
}

/// Read-only mail-provider surface consumed by the extractor.
///
/// Both calls may fail; the extractor does not retry them.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Searches the mailbox, returning at most `max_results` message ids
    /// ordered most recent first.
    async fn search(
        &self,
        query: &SearchQuery,
        max_results: usize,
    ) -> std::result::Result<Vec<MessageId>, ProviderCallError>;

    /// Fetches one message in full form.
    async fn get(&self, id: &MessageId) -> std::result::Result<Message, ProviderCallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_render_without_subject() {
        let query = SearchQuery {
            sender: "info@account.netflix.com".into(),
            recipient: "user@example.com".into(),
            subject_terms: None,
        };
        assert_eq!(
            query.render(),
            r#"from:info@account.netflix.com "user@example.com""#
        );
    }

    #[test]
    fn test_query_render_with_subject() {
        let query = SearchQuery {
            sender: "info@account.netflix.com".into(),
            recipient: "user@example.com".into(),
            subject_terms: Some("code".into()),
        };
        assert_eq!(
            query.render(),
            r#"from:info@account.netflix.com "user@example.com" subject:"code""#
        );
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let message = Message {
            id: MessageId("m1".into()),
            headers: vec![Header {
                name: "Subject".into(),
                value: "Your sign-in code".into(),
            }],
            payload: MessagePayload::default(),
        };

        assert_eq!(message.header("subject"), Some("Your sign-in code"));
        assert_eq!(message.subject(), Some("Your sign-in code"));
        assert_eq!(message.header("From"), None);
    }

    #[test]
    fn test_payload_constructors() {
        let payload = MessagePayload::multipart(
            "multipart/alternative",
            vec![
                MessagePayload::leaf("text/plain", "hello"),
                MessagePayload::leaf("text/html", "<p>hello</p>"),
            ],
        );

        assert!(payload.data.is_none());
        assert_eq!(payload.parts.len(), 2);
        assert_eq!(payload.parts[0].mime_type, "text/plain");
        assert!(payload.parts[0].data.is_some());
    }
}
