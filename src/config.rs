//! Configuration for the relay.
//!
//! Everything the handlers need is collected into one [`RelayConfig`] assembled
//! once at startup and passed down - there are no ambient environment lookups
//! inside command handling.
//!
//! Use [`RelayConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use mail_relay::RelayConfig;
//!
//! let config = RelayConfig::builder()
//!     .admin_id("123456789")
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{Error, Result};
use crate::registry::IdentityId;

/// Upper bound on the provider search result size.
const MAX_SEARCH_LIMIT: usize = 5;

/// Configuration for the relay.
///
/// Create using [`RelayConfig::builder()`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// The designated administrator identity.
    pub admin_id: IdentityId,
    /// Sender address constraining provider searches.
    pub provider_sender: String,
    /// Domain a reset link must belong to.
    pub reset_domain: String,
    /// Path/query token a reset link must contain.
    pub reset_token: String,
    /// Exact length of a sign-in code. Fixed per deployment, never auto-detected.
    pub code_digits: usize,
    /// Maximum number of search results requested from the provider (1..=5).
    pub search_limit: usize,
    /// Per-identity, per-UTC-day request cap. `None` disables quota checks.
    pub daily_limit: Option<u32>,
}

impl RelayConfig {
    /// Creates a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use mail_relay::RelayConfig;
    ///
    /// let config = RelayConfig::builder()
    ///     .admin_id("123456789")
    ///     .code_digits(4)
    ///     .daily_limit(20)
    ///     .build()
    ///     .expect("valid config");
    /// ```
    #[must_use]
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    admin_id: Option<String>,
    provider_sender: Option<String>,
    reset_domain: Option<String>,
    reset_token: Option<String>,
    code_digits: Option<usize>,
    search_limit: Option<usize>,
    daily_limit: Option<u32>,
}

impl RelayConfigBuilder {
    /// Sets the administrator identity (required).
    ///
    /// Only this identity may approve, revoke, and list registrations.
    #[must_use]
    pub fn admin_id(mut self, id: impl Into<String>) -> Self {
        self.admin_id = Some(id.into());
        self
    }

    /// Sets the sender address used to constrain provider searches.
    ///
    /// Default is `info@account.netflix.com`.
    #[must_use]
    pub fn provider_sender(mut self, sender: impl Into<String>) -> Self {
        self.provider_sender = Some(sender.into());
        self
    }

    /// Sets the domain a reset link must belong to.
    ///
    /// Default is `netflix.com`.
    #[must_use]
    pub fn reset_domain(mut self, domain: impl Into<String>) -> Self {
        self.reset_domain = Some(domain.into());
        self
    }

    /// Sets the path/query token a reset link must contain.
    ///
    /// Default is `password`.
    #[must_use]
    pub fn reset_token(mut self, token: impl Into<String>) -> Self {
        self.reset_token = Some(token.into());
        self
    }

    /// Sets the exact sign-in code length.
    ///
    /// Default is 6. Must be greater than zero.
    #[must_use]
    pub fn code_digits(mut self, digits: usize) -> Self {
        self.code_digits = Some(digits);
        self
    }

    /// Sets the provider search result bound.
    ///
    /// Default is 5; values are limited to 1..=5.
    #[must_use]
    pub fn search_limit(mut self, limit: usize) -> Self {
        self.search_limit = Some(limit);
        self
    }

    /// Enables a per-identity daily request quota.
    ///
    /// Disabled by default. Must be greater than zero when set.
    #[must_use]
    pub fn daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> Result<RelayConfig> {
        let admin_id = self.admin_id.ok_or_else(|| Error::InvalidConfig {
            message: "admin_id is required".into(),
        })?;

        let code_digits = self.code_digits.unwrap_or(6);
        if code_digits == 0 {
            return Err(Error::InvalidConfig {
                message: "code_digits must be greater than zero".into(),
            });
        }

        let search_limit = self.search_limit.unwrap_or(MAX_SEARCH_LIMIT);
        if search_limit == 0 || search_limit > MAX_SEARCH_LIMIT {
            return Err(Error::InvalidConfig {
                message: format!("search_limit must be in 1..={MAX_SEARCH_LIMIT}"),
            });
        }

        if self.daily_limit == Some(0) {
            return Err(Error::InvalidConfig {
                message: "daily_limit must be greater than zero".into(),
            });
        }

        Ok(RelayConfig {
            admin_id: IdentityId::from(admin_id),
            provider_sender: self
                .provider_sender
                .unwrap_or_else(|| "info@account.netflix.com".into()),
            reset_domain: self.reset_domain.unwrap_or_else(|| "netflix.com".into()),
            reset_token: self.reset_token.unwrap_or_else(|| "password".into()),
            code_digits,
            search_limit,
            daily_limit: self.daily_limit,
        })
    }
}
