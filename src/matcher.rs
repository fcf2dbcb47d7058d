//! Body content matching for extracting codes and reset links.
//!
//! This module provides a [`Matcher`] trait and the two matchers the relay
//! uses: [`CodeMatcher`] for fixed-length sign-in codes and
//! [`ResetLinkMatcher`] for password-reset URLs.
//!
//! # Example
//!
//! ```
//! use mail_relay::matcher::{CodeMatcher, Matcher};
//!
//! let code = CodeMatcher::digits(4);
//! assert_eq!(code.find_match("Your code 4821 expires soon").as_deref(), Some("4821"));
//! // A longer number never yields a spurious slice
//! assert_eq!(code.find_match("Call 5551234567 today"), None);
//! ```

use regex::Regex;
use std::borrow::Cow;

/// Trait for matching and extracting content from message bodies.
///
/// Returns borrowed slices of the input where possible; first match wins.
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging.
    fn description(&self) -> &str;
}

fn capture_first<'a>(regex: &Regex, text: &'a str) -> Option<Cow<'a, str>> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| Cow::Borrowed(m.as_str()))
}

/// Matcher for fixed-length sign-in codes.
///
/// Matches exactly N digits with no adjacent digit on either side, so a code
/// is never carved out of a longer number (order ids, phone numbers). The
/// length is a deployment parameter, never auto-detected.
///
/// # Example
///
/// ```
/// use mail_relay::matcher::{CodeMatcher, Matcher};
///
/// let matcher = CodeMatcher::digits(6);
/// assert_eq!(matcher.find_match("Sign-in code: 482135.").as_deref(), Some("482135"));
/// assert_eq!(matcher.find_match("Order 48213577 shipped"), None);
/// ```
#[derive(Debug, Clone)]
pub struct CodeMatcher {
    regex: Regex,
    description: String,
}

impl CodeMatcher {
    /// Creates a matcher for codes of exactly `digits` digits.
    ///
    /// Explicit `[^0-9]` guards are used instead of `\b` because the adjacency
    /// rule is about digits, not word characters: `abc4821` is a valid hit,
    /// `54821` is not.
    ///
    /// # Panics
    ///
    /// Panics if `digits` is 0.
    #[must_use]
    pub fn digits(digits: usize) -> Self {
        assert!(digits > 0, "digits must be > 0");
        let pattern = format!(r"(?:^|[^0-9])(\d{{{digits}}})(?:[^0-9]|$)");
        Self {
            regex: Regex::new(&pattern).expect("valid regex"),
            description: format!("{digits}-digit sign-in code"),
        }
    }
}

impl Matcher for CodeMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        capture_first(&self.regex, text)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher for password-reset links scoped to a provider domain and a
/// reset-specific path/query token.
///
/// Two-stage: the `href` attribute of the first anchor whose *target* matches
/// domain-and-token is preferred - visible link text mentioning the domain
/// cannot fool it. When the text carries no matching anchor (plain text, or
/// markup already stripped), a raw URL scan is the fallback.
///
/// # Example
///
/// ```
/// use mail_relay::matcher::{ResetLinkMatcher, Matcher};
///
/// let matcher = ResetLinkMatcher::new("netflix.com", "password");
/// let html = r#"<a href="https://www.netflix.com/password/reset?tok=abc">click here, netflix.com</a>"#;
/// assert_eq!(
///     matcher.find_match(html).as_deref(),
///     Some("https://www.netflix.com/password/reset?tok=abc")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ResetLinkMatcher {
    anchor: Regex,
    raw: Regex,
    description: String,
}

impl ResetLinkMatcher {
    /// Creates a matcher for reset links on `domain` containing `token`.
    ///
    /// Subdomains of `domain` are accepted, but the hostname must *end* at
    /// the domain: `netflix.com.evil.com` is not `netflix.com`.
    ///
    /// # Panics
    ///
    /// Panics if the generated regex cannot be compiled (does not happen for
    /// plain domain/token strings).
    #[must_use]
    pub fn new(domain: &str, token: &str) -> Self {
        let escaped_domain = regex::escape(domain);
        let escaped_token = regex::escape(token);

        // The domain must be followed by a path/port/query delimiter, never
        // by more hostname
        let target = format!(r"https?://(?:[A-Za-z0-9-]+\.)*{escaped_domain}[/:?#]");

        let anchor = Regex::new(&format!(
            r#"(?i)<a\s[^>]*href="({target}[^"]*{escaped_token}[^"]*)""#
        ))
        .expect("valid regex");

        let raw = Regex::new(&format!(
            r#"(?i)({target}[^\s"'<>]*{escaped_token}[^\s"'<>]*)"#
        ))
        .expect("valid regex");

        Self {
            anchor,
            raw,
            description: format!("reset link on {domain} containing '{token}'"),
        }
    }
}

impl Matcher for ResetLinkMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        capture_first(&self.anchor, text).or_else(|| capture_first(&self.raw, text))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_adjacency_exclusion() {
        // The 8-digit order number must not yield a spurious 4-digit match
        let matcher = CodeMatcher::digits(4);
        let text = "Thanks for order #12345678 your code 4821 expires in 15 minutes";
        assert_eq!(matcher.find_match(text).as_deref(), Some("4821"));
    }

    #[test]
    fn test_code_rejects_phone_numbers() {
        let matcher = CodeMatcher::digits(4);
        assert_eq!(matcher.find_match("Call us at 5551234567"), None);
    }

    #[test]
    fn test_code_at_string_boundaries() {
        let matcher = CodeMatcher::digits(4);
        assert_eq!(matcher.find_match("4821 is your code").as_deref(), Some("4821"));
        assert_eq!(matcher.find_match("your code is 4821").as_deref(), Some("4821"));
        assert_eq!(matcher.find_match("4821").as_deref(), Some("4821"));
    }

    #[test]
    fn test_code_first_match_wins() {
        let matcher = CodeMatcher::digits(4);
        assert_eq!(matcher.find_match("codes 1111 and 2222").as_deref(), Some("1111"));
    }

    #[test]
    fn test_code_adjacent_letters_allowed() {
        // Adjacency is about digits, not word characters
        let matcher = CodeMatcher::digits(4);
        assert_eq!(matcher.find_match("ref:4821x").as_deref(), Some("4821"));
    }

    #[test]
    fn test_code_six_digit() {
        let matcher = CodeMatcher::digits(6);
        assert_eq!(
            matcher.find_match("Your Netflix code is 482135.").as_deref(),
            Some("482135")
        );
        assert_eq!(matcher.find_match("Only 48213 here"), None);
    }

    #[test]
    fn test_code_returns_borrowed() {
        let matcher = CodeMatcher::digits(4);
        let result = matcher.find_match("your code is 4821");
        assert!(matches!(result, Some(Cow::Borrowed(_))));
    }

    #[test]
    #[should_panic(expected = "digits must be > 0")]
    fn test_code_zero_digits_panics() {
        let _ = CodeMatcher::digits(0);
    }

    #[test]
    fn test_reset_link_prefers_href_over_visible_text() {
        let matcher = ResetLinkMatcher::new("netflix.com", "password");
        let html =
            r#"<a href="https://www.netflix.com/password/reset?tok=abc">click here, netflix.com</a>"#;
        assert_eq!(
            matcher.find_match(html).as_deref(),
            Some("https://www.netflix.com/password/reset?tok=abc")
        );
    }

    #[test]
    fn test_reset_link_ignores_anchors_without_token() {
        let matcher = ResetLinkMatcher::new("netflix.com", "password");
        let html = concat!(
            r#"<a href="https://www.netflix.com/browse">Browse</a> "#,
            r#"<a href="https://www.netflix.com/password/reset?tok=xyz">Reset</a>"#,
        );
        assert_eq!(
            matcher.find_match(html).as_deref(),
            Some("https://www.netflix.com/password/reset?tok=xyz")
        );
    }

    #[test]
    fn test_reset_link_raw_fallback_on_plain_text() {
        let matcher = ResetLinkMatcher::new("netflix.com", "password");
        let text = "Reset here: https://www.netflix.com/password/reset?tok=abc and enjoy";
        assert_eq!(
            matcher.find_match(text).as_deref(),
            Some("https://www.netflix.com/password/reset?tok=abc")
        );
    }

    #[test]
    fn test_reset_link_rejects_other_domains() {
        let matcher = ResetLinkMatcher::new("netflix.com", "password");
        let html = r#"<a href="https://evil.example.com/password/reset">Reset</a>"#;
        assert_eq!(matcher.find_match(html), None);
    }

    #[test]
    fn test_reset_link_rejects_lookalike_suffix_domain() {
        // The hostname must end at the provider domain; a registrable suffix
        // stuck on the right must not pass either stage
        let matcher = ResetLinkMatcher::new("netflix.com", "password");

        let text = "Reset: https://netflix.com.evil.com/password/reset?tok=abc";
        assert_eq!(matcher.find_match(text), None);

        let html = r#"<a href="https://netflix.com.evil.com/password/reset?tok=abc">Reset</a>"#;
        assert_eq!(matcher.find_match(html), None);

        let html = r#"<a href="https://www.netflix.com.evil.com/password/reset">Reset</a>"#;
        assert_eq!(matcher.find_match(html), None);
    }

    #[test]
    fn test_reset_link_accepts_port_and_query_boundaries() {
        let matcher = ResetLinkMatcher::new("netflix.com", "password");
        assert_eq!(
            matcher
                .find_match("https://netflix.com:443/password/reset")
                .as_deref(),
            Some("https://netflix.com:443/password/reset")
        );
        assert_eq!(
            matcher
                .find_match("https://netflix.com/?next=password-reset")
                .as_deref(),
            Some("https://netflix.com/?next=password-reset")
        );
    }

    #[test]
    fn test_reset_link_rejects_domain_mention_without_url() {
        let matcher = ResetLinkMatcher::new("netflix.com", "password");
        assert_eq!(
            matcher.find_match("visit netflix.com to reset your password"),
            None
        );
    }

    #[test]
    fn test_reset_link_domain_is_escaped() {
        // The dot in the domain must not act as a regex wildcard
        let matcher = ResetLinkMatcher::new("netflix.com", "password");
        assert_eq!(
            matcher.find_match("https://netflixxcom/password/reset"),
            None
        );
    }
}
