//! Mail extractor: bounded search, single fetch, body decode, pattern match.
//!
//! [`MailExtractor::extract`] runs the whole sequence for one request and
//! returns an [`ExtractionResult`]. A mailbox with no matching message, or a
//! message whose body carries no matching pattern, is a *normal* outcome
//! (`found() == false`) - only upstream call failures become
//! [`Error::Provider`], and the two must never be conflated.

use crate::body::{self, PartPreference};
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::matcher::{CodeMatcher, Matcher, ResetLinkMatcher};
use crate::provider::{MailProvider, SearchQuery};
use tracing::{debug, instrument, warn};

/// The category of value being extracted from a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A short fixed-length sign-in code.
    Code,
    /// A password-reset URL.
    ResetLink,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Code => write!(f, "code"),
            ContentKind::ResetLink => write!(f, "reset_link"),
        }
    }
}

/// One extraction request. Ephemeral; never persisted.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// The mailbox address being searched (distinct from the requester's
    /// chat identity).
    pub target_mailbox: String,
    /// What to extract.
    pub kind: ContentKind,
}

/// Result of an extraction. Ephemeral; returned to the caller, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    value: Option<String>,
}

impl ExtractionResult {
    /// A successful extraction carrying the matched value.
    #[must_use]
    pub fn found(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// The clean not-found sentinel (no message, or no pattern match).
    #[must_use]
    pub fn not_found() -> Self {
        Self { value: None }
    }

    /// Returns the matched value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns whether a value was extracted.
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

/// Extracts codes and reset links from a provider mailbox.
///
/// # Example
///
/// ```no_run
/// use mail_relay::{RelayConfig, MailExtractor};
/// use mail_relay::extractor::{ContentKind, ExtractionRequest};
/// # use mail_relay::provider::MailProvider;
///
/// # async fn example(provider: impl MailProvider) -> mail_relay::Result<()> {
/// let config = RelayConfig::builder().admin_id("1").build()?;
/// let extractor = MailExtractor::new(provider, &config);
///
/// let result = extractor
///     .extract(&ExtractionRequest {
///         target_mailbox: "user@example.com".into(),
///         kind: ContentKind::Code,
///     })
///     .await?;
///
/// match result.value() {
///     Some(code) => println!("code: {code}"),
///     None => println!("nothing waiting in the mailbox"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct MailExtractor<P: MailProvider> {
    provider: P,
    sender: String,
    search_limit: usize,
    code_matcher: CodeMatcher,
    reset_matcher: ResetLinkMatcher,
}

impl<P: MailProvider> MailExtractor<P> {
    /// Creates an extractor over the given provider, configured from `config`.
    pub fn new(provider: P, config: &RelayConfig) -> Self {
        Self {
            provider,
            sender: config.provider_sender.clone(),
            search_limit: config.search_limit,
            code_matcher: CodeMatcher::digits(config.code_digits),
            reset_matcher: ResetLinkMatcher::new(&config.reset_domain, &config.reset_token),
        }
    }

    /// Runs one extraction: search, fetch, decode, match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the upstream search or get call fails,
    /// or [`Error::BodyDecode`] if the single body of a located message is
    /// undecodable. A clean miss is `Ok` with `found() == false`.
    #[instrument(
        name = "MailExtractor::extract",
        skip(self),
        fields(mailbox = %request.target_mailbox, kind = %request.kind)
    )]
    pub async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        let query = self.build_query(request);
        debug!(query = %query.render(), "Searching provider");

        let ids = self
            .provider
            .search(&query, self.search_limit)
            .await
            .map_err(|source| Error::Provider {
                operation: "search",
                source,
            })?;

        let Some(id) = ids.first() else {
            debug!("No messages matched the search");
            return Ok(ExtractionResult::not_found());
        };

        let message = self
            .provider
            .get(id)
            .await
            .map_err(|source| Error::Provider {
                operation: "get",
                source,
            })?;

        debug!(id = %message.id, subject = message.subject().unwrap_or("(none)"), "Fetched message");

        let preference = match request.kind {
            ContentKind::Code => PartPreference::PlainFirst,
            // Reset links want real href attributes, so markup first
            ContentKind::ResetLink => PartPreference::HtmlFirst,
        };

        let Some(located) = body::find_body_text(&message.payload, preference)
            .map_err(|source| Error::BodyDecode { source })?
        else {
            warn!(id = %message.id, "Message has no usable textual body");
            return Ok(ExtractionResult::not_found());
        };

        let matched = match request.kind {
            ContentKind::Code => {
                let text = if located.is_html {
                    std::borrow::Cow::Owned(body::strip_html(&located.text))
                } else {
                    std::borrow::Cow::Borrowed(located.text.as_str())
                };
                self.code_matcher
                    .find_match(&text)
                    .map(|m| m.into_owned())
            }
            ContentKind::ResetLink => {
                // The anchor-aware stage needs the markup intact; the matcher
                // falls back to a raw URL scan on its own
                let mut found = self
                    .reset_matcher
                    .find_match(&located.text)
                    .map(|m| m.into_owned());
                if found.is_none() && located.is_html {
                    let flattened = body::strip_html(&located.text);
                    found = self
                        .reset_matcher
                        .find_match(&flattened)
                        .map(|m| m.into_owned());
                }
                found
            }
        };

        match matched {
            Some(value) => {
                debug!(
                    matcher = self.matcher_for(request.kind).description(),
                    "Extraction succeeded"
                );
                Ok(ExtractionResult::found(value))
            }
            None => {
                // Distinct from "no message" only in logging; both render as
                // not-found to the end user
                debug!(
                    id = %message.id,
                    matcher = self.matcher_for(request.kind).description(),
                    "Message body carried no match"
                );
                Ok(ExtractionResult::not_found())
            }
        }
    }

    fn build_query(&self, request: &ExtractionRequest) -> SearchQuery {
        let subject_terms = match request.kind {
            ContentKind::Code => "code",
            ContentKind::ResetLink => "reset your password",
        };

        SearchQuery {
            sender: self.sender.clone(),
            recipient: request.target_mailbox.clone(),
            subject_terms: Some(subject_terms.to_string()),
        }
    }

    fn matcher_for(&self, kind: ContentKind) -> &dyn Matcher {
        match kind {
            ContentKind::Code => &self.code_matcher,
            ContentKind::ResetLink => &self.reset_matcher,
        }
    }
}

impl<P: MailProvider> std::fmt::Debug for MailExtractor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailExtractor")
            .field("sender", &self.sender)
            .field("search_limit", &self.search_limit)
            .finish_non_exhaustive()
    }
}
