//! # mail-relay
//!
//! Access-gated extraction of one-time sign-in codes and password-reset links
//! from a provider mailbox, for relaying over a chat transport.
//!
//! The crate has two small components, evaluated per inbound command:
//!
//! - **Access registry** ([`registry`]): which requester identities are
//!   pending, approved, or revoked, plus an optional per-identity daily
//!   quota. Backed by an injected [`store::RegistryStore`].
//! - **Mail extractor** ([`extractor`]): bounded search against the mail
//!   provider, fetch of the best match, body decode, and pattern extraction
//!   of a code or reset link.
//!
//! [`CommandRouter`] wires them together: an inbound
//! `(requester, command, args)` is gated on identity state (and quota, if
//! enabled), the extraction runs, and a plain-text reply comes back.
//!
//! The chat-transport SDK, the provider's authentication and API transport,
//! and process startup stay outside the crate; [`provider::MailProvider`] and
//! [`commands::ChatNotifier`] are the seams to implement against them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mail_relay::{CommandRouter, NullNotifier, RelayConfig};
//! use mail_relay::registry::IdentityId;
//! use mail_relay::store::JsonFileStore;
//! # use mail_relay::provider::MailProvider;
//!
//! # async fn example(provider: impl MailProvider) -> mail_relay::Result<()> {
//! let config = RelayConfig::builder()
//!     .admin_id("123456789")
//!     .daily_limit(20)
//!     .build()?;
//!
//! let router = CommandRouter::assemble(
//!     config,
//!     JsonFileStore::new("registry.json"),
//!     provider,
//!     NullNotifier,
//! );
//!
//! // Wire this into your chat transport's command handler:
//! let requester = IdentityId::from("987654");
//! let reply = router
//!     .handle(&requester, "get_code", &["user@example.com".into()])
//!     .await;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! User-caused denials (not registered, not approved, quota exhausted, bad
//! arguments) and internal faults (provider outage, storage failure) are kept
//! apart: see [`Error::is_denial`] and [`Error::category`]. A mailbox with no
//! matching message is neither - extraction reports it as a clean
//! not-found result.
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Command handling, registry
//! transitions, and extractions emit spans named `Type::method` with
//! structured fields (`requester`, `command`, `mailbox`, `kind`, `matcher`).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod body;
pub mod commands;
pub mod config;
pub mod error;
pub mod extractor;
pub mod matcher;
pub mod provider;
pub mod registry;
pub mod store;

// Re-exports for ergonomic API
pub use commands::{ChatNotifier, Command, CommandRouter, NullNotifier};
pub use config::{RelayConfig, RelayConfigBuilder};
pub use error::{Error, ErrorCategory, Result};
pub use extractor::{ContentKind, ExtractionRequest, ExtractionResult, MailExtractor};
pub use provider::{MailProvider, SearchQuery};
pub use registry::{AccessRegistry, IdentityId, IdentityState};
