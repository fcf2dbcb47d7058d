//! Error types for the mail-relay crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized for logging - see [`Error::category`].
//!
//! Note that a clean "no message / no pattern match" is **not** an error: extraction
//! returns [`ExtractionResult`](crate::extractor::ExtractionResult) with `found() == false`.
//! [`Error::Provider`] is reserved for upstream call failures and must never be collapsed
//! into a not-found outcome.

use crate::provider::ProviderCallError;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during command handling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// The target mailbox argument is not a valid email address.
    #[error("invalid mailbox address: {mailbox}")]
    InvalidMailbox {
        /// The rejected mailbox string.
        mailbox: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Access-control errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A non-administrator invoked an administrator-only operation.
    #[error("identity {actor} is not authorized for administrative operations")]
    Unauthorized {
        /// The identity that attempted the operation.
        actor: String,
    },

    /// An identity that is not approved attempted an extraction.
    #[error("identity {id} is not approved for extraction")]
    NotApproved {
        /// The gated identity.
        id: String,
    },

    /// The operation is not valid for the identity's current state.
    #[error("cannot {operation} identity {id} in state {state}")]
    InvalidTransition {
        /// The target identity.
        id: String,
        /// The identity's current state (or "unknown" if no record exists).
        state: String,
        /// The attempted operation.
        operation: &'static str,
    },

    /// The identity has exhausted its daily request quota.
    #[error("identity {id} reached the daily limit of {limit} requests")]
    QuotaExceeded {
        /// The identity that hit the limit.
        id: String,
        /// The configured daily limit.
        limit: u32,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Registry persistence errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to read or write the persisted registry.
    #[error("registry storage failed at {path}")]
    Storage {
        /// The file path (or store description) involved.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted registry exists but could not be decoded.
    #[error("registry state at {path} is corrupt")]
    CorruptState {
        /// The file path (or store description) involved.
        path: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Mail provider / content errors
    // ─────────────────────────────────────────────────────────────────────────
    /// An upstream provider call (search or get) failed.
    ///
    /// Distinct from a clean not-found outcome: the caller must render this as
    /// a failure, not as "no message".
    #[error("provider {operation} call failed")]
    Provider {
        /// The provider operation that failed ("search" or "get").
        operation: &'static str,
        /// The underlying provider error.
        #[source]
        source: ProviderCallError,
    },

    /// A message body could not be decoded from its transport encoding.
    #[error("failed to decode message body")]
    BodyDecode {
        /// The underlying decode error.
        #[source]
        source: BodyDecodeError,
    },
}

/// Reasons a transport-encoded body fails to decode.
#[derive(Debug, Error)]
pub enum BodyDecodeError {
    /// The body data is not valid base64url.
    #[error("body is not valid base64url")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not valid UTF-8.
    #[error("decoded body is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. } => ErrorCategory::Configuration,
            Error::InvalidMailbox { .. } => ErrorCategory::Validation,
            Error::Unauthorized { .. } => ErrorCategory::Authorization,
            Error::NotApproved { .. } | Error::InvalidTransition { .. } => ErrorCategory::State,
            Error::QuotaExceeded { .. } => ErrorCategory::Quota,
            Error::Storage { .. } | Error::CorruptState { .. } => ErrorCategory::Storage,
            Error::Provider { .. } => ErrorCategory::Provider,
            Error::BodyDecode { .. } => ErrorCategory::Parse,
        }
    }

    /// Returns `true` if this error is a denial the end user caused
    /// (authorization, state, quota, or a bad argument), as opposed to an
    /// internal fault.
    ///
    /// Denials render as short refusal messages and are never retried.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Error::Unauthorized { .. }
                | Error::NotApproved { .. }
                | Error::InvalidTransition { .. }
                | Error::QuotaExceeded { .. }
                | Error::InvalidMailbox { .. }
        )
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration errors.
    Configuration,
    /// Request argument validation errors.
    Validation,
    /// Administrative authorization failures.
    Authorization,
    /// Operations invalid for the identity's current state.
    State,
    /// Daily quota exhaustion.
    Quota,
    /// Registry load/persist failures.
    Storage,
    /// Upstream mail-provider failures.
    Provider,
    /// Body decoding failures.
    Parse,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Authorization => write!(f, "authorization"),
            ErrorCategory::State => write!(f, "state"),
            ErrorCategory::Quota => write!(f, "quota"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Provider => write!(f, "provider"),
            ErrorCategory::Parse => write!(f, "parse"),
        }
    }
}
