//! Command routing: parse, gate, extract, reply.
//!
//! The chat transport delivers `(requester, command, args)` and expects a
//! plain-text reply (with optional `*inline*` emphasis). [`CommandRouter`]
//! owns the registry, the extractor, and the configuration, and handles one
//! command per call: gate on identity state, consume quota if configured,
//! run the extraction, render the outcome.
//!
//! Every invocation is isolated - no error here is fatal, and denials
//! (authorization, state, quota, bad arguments) are short refusal messages
//! that are never retried.

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::extractor::{ContentKind, ExtractionRequest, ExtractionResult, MailExtractor};
use crate::provider::MailProvider;
use crate::registry::{AccessRegistry, IdentityId, QuotaOutcome, RegisterOutcome};
use crate::store::RegistryStore;
use async_trait::async_trait;
use chrono::Utc;
use email_address::EmailAddress;
use tracing::{debug, error, instrument, warn};

/// Side-channel delivery of notifications (admin alerts, approval notices).
///
/// Fire-and-forget: implementations should log delivery failures rather than
/// surface them, so a broken side channel never fails the command itself.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Delivers `text` to `recipient` outside the command/reply exchange.
    async fn notify(&self, recipient: &IdentityId, text: &str);
}

/// A notifier that drops all notifications. Useful for tests and variants
/// without a side channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl ChatNotifier for NullNotifier {
    async fn notify(&self, _recipient: &IdentityId, _text: &str) {}
}

/// A parsed inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Self-enrollment (`register` or `start`).
    Register,
    /// Extraction of a sign-in code from the given mailbox.
    GetCode {
        /// Mailbox to search.
        mailbox: String,
    },
    /// Extraction of a password-reset link from the given mailbox.
    GetReset {
        /// Mailbox to search.
        mailbox: String,
    },
    /// Admin: approve a pending identity.
    Approve {
        /// Identity to approve.
        target: IdentityId,
    },
    /// Admin: revoke an approved identity.
    Revoke {
        /// Identity to revoke.
        target: IdentityId,
    },
    /// Admin: list identities awaiting approval.
    ListPending,
    /// Admin: list approved identities.
    ListApproved,
}

impl Command {
    /// Parses a command name and argument list.
    ///
    /// Leading slashes are tolerated (`/register` == `register`); `start` is
    /// an alias for `register`. Returns `None` for unknown names or wrong
    /// arity - the router answers those with a usage message.
    #[must_use]
    pub fn parse(name: &str, args: &[String]) -> Option<Self> {
        let name = name.trim_start_matches('/').to_ascii_lowercase();

        match (name.as_str(), args) {
            ("register" | "start", []) => Some(Command::Register),
            ("get_code", [mailbox]) => Some(Command::GetCode {
                mailbox: mailbox.clone(),
            }),
            ("get_reset", [mailbox]) => Some(Command::GetReset {
                mailbox: mailbox.clone(),
            }),
            ("approve", [target]) => Some(Command::Approve {
                target: IdentityId::from(target.as_str()),
            }),
            ("revoke", [target]) => Some(Command::Revoke {
                target: IdentityId::from(target.as_str()),
            }),
            ("list_pending", []) => Some(Command::ListPending),
            ("list_approved", []) => Some(Command::ListApproved),
            _ => None,
        }
    }
}

const USAGE: &str = "Commands: /register, /get_code <mailbox>, /get_reset <mailbox>, \
                     /approve <id>, /revoke <id>, /list_pending, /list_approved";

/// Routes inbound chat commands through access control to extraction.
pub struct CommandRouter<S, P, N>
where
    S: RegistryStore,
    P: MailProvider,
    N: ChatNotifier,
{
    config: RelayConfig,
    registry: AccessRegistry<S>,
    extractor: MailExtractor<P>,
    notifier: N,
}

impl<S, P, N> CommandRouter<S, P, N>
where
    S: RegistryStore,
    P: MailProvider,
    N: ChatNotifier,
{
    /// Creates a router from its collaborators.
    ///
    /// The registry must be constructed with the same administrator identity
    /// as `config.admin_id`; [`assemble`](Self::assemble) does this for you.
    pub fn new(
        config: RelayConfig,
        registry: AccessRegistry<S>,
        extractor: MailExtractor<P>,
        notifier: N,
    ) -> Self {
        Self {
            config,
            registry,
            extractor,
            notifier,
        }
    }

    /// Assembles a router from config, store, provider, and notifier.
    pub fn assemble(config: RelayConfig, store: S, provider: P, notifier: N) -> Self {
        let registry = AccessRegistry::new(store, config.admin_id.clone());
        let extractor = MailExtractor::new(provider, &config);
        Self::new(config, registry, extractor, notifier)
    }

    /// Handles one inbound command and returns the reply text.
    ///
    /// Never fails: errors are rendered into reply text (denials as short
    /// refusals, faults as a generic failure message) and logged with their
    /// category.
    #[instrument(
        name = "CommandRouter::handle",
        skip(self, args),
        fields(requester = %requester, command = name)
    )]
    pub async fn handle(&self, requester: &IdentityId, name: &str, args: &[String]) -> String {
        let Some(command) = Command::parse(name, args) else {
            debug!("Unknown command or bad arity");
            return USAGE.to_string();
        };

        match self.dispatch(requester, command).await {
            Ok(reply) => reply,
            Err(e) => self.render_error(&e),
        }
    }

    async fn dispatch(&self, requester: &IdentityId, command: Command) -> Result<String> {
        match command {
            Command::Register => self.handle_register(requester).await,
            Command::GetCode { mailbox } => {
                self.handle_extraction(requester, mailbox, ContentKind::Code)
                    .await
            }
            Command::GetReset { mailbox } => {
                self.handle_extraction(requester, mailbox, ContentKind::ResetLink)
                    .await
            }
            Command::Approve { target } => self.handle_approve(requester, &target).await,
            Command::Revoke { target } => {
                self.registry.revoke(requester, &target)?;
                Ok(format!("Identity {target} revoked."))
            }
            Command::ListPending => {
                self.require_admin(requester)?;
                Ok(render_listing("Pending", &self.registry.list_pending()?))
            }
            Command::ListApproved => {
                self.require_admin(requester)?;
                Ok(render_listing("Approved", &self.registry.list_approved()?))
            }
        }
    }

    async fn handle_register(&self, requester: &IdentityId) -> Result<String> {
        let outcome = self.registry.register(requester)?;

        let reply = match outcome {
            RegisterOutcome::Registered => {
                self.notifier
                    .notify(
                        &self.config.admin_id,
                        &format!(
                            "New registration request from {requester}. \
                             Approve with /approve {requester}"
                        ),
                    )
                    .await;
                "Registration received. Please wait for admin approval."
            }
            RegisterOutcome::AlreadyPending => {
                "Your registration is pending approval. Please wait."
            }
            RegisterOutcome::AlreadyKnown => "This identity is already registered.",
        };

        Ok(reply.to_string())
    }

    async fn handle_approve(&self, requester: &IdentityId, target: &IdentityId) -> Result<String> {
        self.registry.approve(requester, target)?;

        self.notifier
            .notify(
                target,
                "Your registration is approved! You can now use /get_code and /get_reset.",
            )
            .await;

        Ok(format!("Identity {target} approved."))
    }

    async fn handle_extraction(
        &self,
        requester: &IdentityId,
        mailbox: String,
        kind: ContentKind,
    ) -> Result<String> {
        if mailbox.parse::<EmailAddress>().is_err() {
            return Err(Error::InvalidMailbox { mailbox });
        }

        // Gate before anything touches the provider
        if !self.registry.is_approved(requester)? {
            return Err(Error::NotApproved {
                id: requester.to_string(),
            });
        }

        // Quota is consumed on gate pass, regardless of what extraction finds
        if let Some(limit) = self.config.daily_limit {
            let today = Utc::now().date_naive();
            match self.registry.check_and_consume_quota(requester, limit, today)? {
                QuotaOutcome::Allowed { remaining } => {
                    debug!(remaining, "Quota consumed");
                }
                QuotaOutcome::LimitReached { limit } => {
                    return Err(Error::QuotaExceeded {
                        id: requester.to_string(),
                        limit,
                    });
                }
            }
        }

        let request = ExtractionRequest {
            target_mailbox: mailbox.clone(),
            kind,
        };
        let result = self.extractor.extract(&request).await?;

        Ok(render_extraction(&mailbox, kind, &result))
    }

    fn require_admin(&self, requester: &IdentityId) -> Result<()> {
        if *requester == self.config.admin_id {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                actor: requester.to_string(),
            })
        }
    }

    fn render_error(&self, e: &Error) -> String {
        if e.is_denial() {
            warn!(category = %e.category(), error = %e, "Command denied");
        } else {
            error!(category = %e.category(), error = %e, "Command failed");
        }

        match e {
            Error::Unauthorized { .. } => "You are not authorized to do that.".to_string(),
            Error::NotApproved { .. } => {
                "You are not approved yet. Please register and wait for admin approval."
                    .to_string()
            }
            Error::InvalidTransition { id, state, .. } => {
                format!("Cannot do that: identity {id} is {state}.")
            }
            Error::QuotaExceeded { limit, .. } => {
                format!("Daily limit of {limit} requests reached. Try again tomorrow.")
            }
            Error::InvalidMailbox { mailbox } => {
                format!("'{mailbox}' is not a valid mailbox address.")
            }
            // Faults all render the same generic message; the taxonomy stays
            // distinct in the logs
            Error::Provider { .. }
            | Error::Storage { .. }
            | Error::CorruptState { .. }
            | Error::BodyDecode { .. }
            | Error::InvalidConfig { .. } => {
                "Something went wrong on our side. Please try again later.".to_string()
            }
        }
    }
}

impl<S, P, N> std::fmt::Debug for CommandRouter<S, P, N>
where
    S: RegistryStore,
    P: MailProvider,
    N: ChatNotifier,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("admin_id", &self.config.admin_id)
            .field("daily_limit", &self.config.daily_limit)
            .finish_non_exhaustive()
    }
}

fn render_extraction(mailbox: &str, kind: ContentKind, result: &ExtractionResult) -> String {
    match (kind, result.value()) {
        (ContentKind::Code, Some(code)) => format!("*Your sign-in code:* {code}"),
        (ContentKind::ResetLink, Some(url)) => format!("*Your reset link:* {url}"),
        (ContentKind::Code, None) => {
            format!("No sign-in code email found for {mailbox}.")
        }
        (ContentKind::ResetLink, None) => {
            format!("No password reset email found for {mailbox}.")
        }
    }
}

fn render_listing(label: &str, ids: &[IdentityId]) -> String {
    if ids.is_empty() {
        format!("{label}: none.")
    } else {
        let joined = ids
            .iter()
            .map(IdentityId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{label}: {joined}")
    }
}
