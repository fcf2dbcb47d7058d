//! Access registry: approval state and daily quota per requester identity.
//!
//! The registry is an explicit object backed by an injected [`RegistryStore`] -
//! there is no process-wide singleton, and tests run against
//! [`MemoryStore`](crate::store::MemoryStore).
//!
//! An identity moves along a single path:
//!
//! ```text
//! unknown ──register──▶ pending ──approve──▶ approved ──revoke──▶ revoked
//! ```
//!
//! `unknown` is the absence of a record. No transition leads back: a revoked
//! identity cannot re-register and there is no re-approval path.
//!
//! # Example
//!
//! ```
//! use mail_relay::registry::{AccessRegistry, IdentityId, RegisterOutcome};
//! use mail_relay::store::MemoryStore;
//!
//! # fn example() -> mail_relay::Result<()> {
//! let admin = IdentityId::from("1");
//! let registry = AccessRegistry::new(MemoryStore::new(), admin.clone());
//!
//! let user = IdentityId::from("7");
//! assert_eq!(registry.register(&user)?, RegisterOutcome::Registered);
//! registry.approve(&admin, &user)?;
//! assert!(registry.is_approved(&user)?);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::store::RegistryStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Opaque stable identifier of a requester (chat/session identity).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for IdentityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Approval state of a known identity.
///
/// The implicit `unknown` state is represented by the absence of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityState {
    /// Self-registered, awaiting admin approval.
    Pending,
    /// Approved by the administrator; may invoke extraction.
    Approved,
    /// Revoked by the administrator; may not re-register.
    Revoked,
}

impl std::fmt::Display for IdentityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityState::Pending => write!(f, "pending"),
            IdentityState::Approved => write!(f, "approved"),
            IdentityState::Revoked => write!(f, "revoked"),
        }
    }
}

/// Persisted record for one identity.
///
/// Records are created lazily on first self-registration and never deleted,
/// only transitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Current approval state.
    pub state: IdentityState,
    /// Extraction requests served on `count_date`.
    #[serde(default)]
    pub daily_count: u32,
    /// The UTC calendar day `daily_count` applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_date: Option<NaiveDate>,
}

impl IdentityRecord {
    fn pending() -> Self {
        Self {
            state: IdentityState::Pending,
            daily_count: 0,
            count_date: None,
        }
    }
}

/// Outcome of a self-registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The identity was unknown and is now pending.
    Registered,
    /// The identity is already pending; nothing changed.
    AlreadyPending,
    /// The identity is already approved or revoked; nothing changed.
    ///
    /// Revoked identities deliberately land here: re-registration would make
    /// revocation advisory.
    AlreadyKnown,
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    /// The request is within the daily limit; one unit was consumed.
    Allowed {
        /// Units left for the rest of the day after this one.
        remaining: u32,
    },
    /// The daily limit is exhausted; nothing was consumed.
    LimitReached {
        /// The configured daily limit.
        limit: u32,
    },
}

/// Registry of requester identities, their approval state, and daily usage.
///
/// Every mutating operation reads the full persisted snapshot, applies the
/// transition, and rewrites the snapshot. Persistence is synchronous and
/// last-writer-wins; no atomicity across a crash mid-write is guaranteed.
#[derive(Debug)]
pub struct AccessRegistry<S: RegistryStore> {
    store: S,
    admin_id: IdentityId,
}

impl<S: RegistryStore> AccessRegistry<S> {
    /// Creates a registry over the given store with the designated administrator.
    pub fn new(store: S, admin_id: IdentityId) -> Self {
        Self { store, admin_id }
    }

    /// Self-registers an identity.
    ///
    /// An unknown identity becomes pending (persisted). Pending, approved, and
    /// revoked identities are left untouched and reported as such.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    #[instrument(name = "AccessRegistry::register", skip(self), fields(id = %id))]
    pub fn register(&self, id: &IdentityId) -> Result<RegisterOutcome> {
        let mut records = self.store.load()?;

        let outcome = match records.get(id).map(|r| r.state) {
            None => {
                records.insert(id.clone(), IdentityRecord::pending());
                self.store.save(&records)?;
                RegisterOutcome::Registered
            }
            Some(IdentityState::Pending) => RegisterOutcome::AlreadyPending,
            Some(IdentityState::Approved | IdentityState::Revoked) => RegisterOutcome::AlreadyKnown,
        };

        debug!(?outcome, "Registration handled");
        Ok(outcome)
    }

    /// Approves a pending identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] unless `actor` is the administrator,
    /// [`Error::InvalidTransition`] unless the target is pending (no write is
    /// performed in either case), or a storage error.
    #[instrument(
        name = "AccessRegistry::approve",
        skip(self),
        fields(actor = %actor, target = %target)
    )]
    pub fn approve(&self, actor: &IdentityId, target: &IdentityId) -> Result<()> {
        self.transition(actor, target, "approve", IdentityState::Pending, IdentityState::Approved)
    }

    /// Revokes an approved identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] unless `actor` is the administrator,
    /// [`Error::InvalidTransition`] unless the target is approved (no write is
    /// performed in either case), or a storage error.
    #[instrument(
        name = "AccessRegistry::revoke",
        skip(self),
        fields(actor = %actor, target = %target)
    )]
    pub fn revoke(&self, actor: &IdentityId, target: &IdentityId) -> Result<()> {
        self.transition(actor, target, "revoke", IdentityState::Approved, IdentityState::Revoked)
    }

    /// Returns whether the identity is currently approved. Pure read.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn is_approved(&self, id: &IdentityId) -> Result<bool> {
        let records = self.store.load()?;
        Ok(records
            .get(id)
            .is_some_and(|r| r.state == IdentityState::Approved))
    }

    /// Checks the daily quota for `id` and consumes one unit if allowed.
    ///
    /// The counter resets the first time this is evaluated on a new calendar
    /// day. Consumption happens at gate time and is unconditional on the
    /// outcome of the extraction that follows - an allowed request that finds
    /// nothing still costs a unit. `LimitReached` performs no write.
    ///
    /// `today` is passed explicitly so callers control the reference day
    /// (production uses `Utc::now().date_naive()`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the identity has no record, or
    /// a storage error.
    #[instrument(
        name = "AccessRegistry::check_and_consume_quota",
        skip(self),
        fields(id = %id, limit)
    )]
    pub fn check_and_consume_quota(
        &self,
        id: &IdentityId,
        limit: u32,
        today: NaiveDate,
    ) -> Result<QuotaOutcome> {
        let mut records = self.store.load()?;

        let record = records.get_mut(id).ok_or_else(|| Error::InvalidTransition {
            id: id.to_string(),
            state: "unknown".into(),
            operation: "consume quota for",
        })?;

        if record.count_date != Some(today) {
            record.daily_count = 0;
            record.count_date = Some(today);
        }

        if record.daily_count >= limit {
            debug!(count = record.daily_count, "Daily limit reached");
            return Ok(QuotaOutcome::LimitReached { limit });
        }

        record.daily_count += 1;
        let remaining = limit - record.daily_count;
        self.store.save(&records)?;

        debug!(remaining, "Quota unit consumed");
        Ok(QuotaOutcome::Allowed { remaining })
    }

    /// Lists identities awaiting approval, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_pending(&self) -> Result<Vec<IdentityId>> {
        self.list_in_state(IdentityState::Pending)
    }

    /// Lists approved identities, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_approved(&self) -> Result<Vec<IdentityId>> {
        self.list_in_state(IdentityState::Approved)
    }

    fn list_in_state(&self, state: IdentityState) -> Result<Vec<IdentityId>> {
        let records = self.store.load()?;
        Ok(records
            .into_iter()
            .filter(|(_, r)| r.state == state)
            .map(|(id, _)| id)
            .collect())
    }

    /// Applies an admin-gated `from -> to` transition.
    fn transition(
        &self,
        actor: &IdentityId,
        target: &IdentityId,
        operation: &'static str,
        from: IdentityState,
        to: IdentityState,
    ) -> Result<()> {
        if *actor != self.admin_id {
            return Err(Error::Unauthorized {
                actor: actor.to_string(),
            });
        }

        let mut records = self.store.load()?;

        let record = records.get_mut(target);
        match record {
            Some(record) if record.state == from => {
                record.state = to;
            }
            Some(record) => {
                return Err(Error::InvalidTransition {
                    id: target.to_string(),
                    state: record.state.to_string(),
                    operation,
                });
            }
            None => {
                return Err(Error::InvalidTransition {
                    id: target.to_string(),
                    state: "unknown".into(),
                    operation,
                });
            }
        }

        self.store.save(&records)?;
        debug!(%target, %to, "Identity transitioned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> AccessRegistry<MemoryStore> {
        AccessRegistry::new(MemoryStore::new(), IdentityId::from("admin"))
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_register_unknown_becomes_pending() {
        let reg = registry();
        let id = IdentityId::from("7");

        assert_eq!(reg.register(&id).unwrap(), RegisterOutcome::Registered);
        assert!(!reg.is_approved(&id).unwrap());
        assert_eq!(reg.list_pending().unwrap(), vec![id]);
    }

    #[test]
    fn test_register_idempotent_while_pending() {
        let reg = registry();
        let id = IdentityId::from("7");

        reg.register(&id).unwrap();
        let writes = reg.store.write_count();

        assert_eq!(reg.register(&id).unwrap(), RegisterOutcome::AlreadyPending);
        assert_eq!(reg.register(&id).unwrap(), RegisterOutcome::AlreadyPending);

        // No duplicate entries, no state change, no extra writes
        assert_eq!(reg.list_pending().unwrap().len(), 1);
        assert_eq!(reg.store.write_count(), writes);
    }

    #[test]
    fn test_full_lifecycle() {
        let reg = registry();
        let admin = IdentityId::from("admin");
        let id = IdentityId::from("7");

        reg.register(&id).unwrap();
        reg.approve(&admin, &id).unwrap();
        assert!(reg.is_approved(&id).unwrap());
        assert_eq!(reg.list_approved().unwrap(), vec![id.clone()]);

        reg.revoke(&admin, &id).unwrap();
        assert!(!reg.is_approved(&id).unwrap());
        assert!(reg.list_approved().unwrap().is_empty());
    }

    #[test]
    fn test_approve_requires_admin() {
        let reg = registry();
        let id = IdentityId::from("7");
        reg.register(&id).unwrap();

        let outsider = IdentityId::from("8");
        let err = reg.approve(&outsider, &id).unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
        assert!(!reg.is_approved(&id).unwrap());
    }

    #[test]
    fn test_approve_non_pending_fails_without_write() {
        let reg = registry();
        let admin = IdentityId::from("admin");
        let id = IdentityId::from("7");

        reg.register(&id).unwrap();
        reg.approve(&admin, &id).unwrap();

        let before = reg.store.snapshot_json();
        let writes = reg.store.write_count();

        // Approving an already-approved identity is a state error
        let err = reg.approve(&admin, &id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        // Registry content is byte-identical; nothing was persisted
        assert_eq!(reg.store.snapshot_json(), before);
        assert_eq!(reg.store.write_count(), writes);
    }

    #[test]
    fn test_approve_unknown_fails() {
        let reg = registry();
        let admin = IdentityId::from("admin");

        let err = reg.approve(&admin, &IdentityId::from("ghost")).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_revoke_requires_approved() {
        let reg = registry();
        let admin = IdentityId::from("admin");
        let id = IdentityId::from("7");

        reg.register(&id).unwrap();

        // Pending identities cannot be revoked
        let err = reg.revoke(&admin, &id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_revoked_cannot_reregister_or_be_reapproved() {
        let reg = registry();
        let admin = IdentityId::from("admin");
        let id = IdentityId::from("7");

        reg.register(&id).unwrap();
        reg.approve(&admin, &id).unwrap();
        reg.revoke(&admin, &id).unwrap();

        // Re-registration is refused without a transition
        assert_eq!(reg.register(&id).unwrap(), RegisterOutcome::AlreadyKnown);
        assert!(reg.list_pending().unwrap().is_empty());

        // There is no path back to approved
        let err = reg.approve(&admin, &id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert!(!reg.is_approved(&id).unwrap());
    }

    #[test]
    fn test_quota_limit_boundary() {
        let reg = registry();
        let admin = IdentityId::from("admin");
        let id = IdentityId::from("7");
        let today = day("2024-03-01");

        reg.register(&id).unwrap();
        reg.approve(&admin, &id).unwrap();

        // Calls 1..=20 are allowed
        for n in 1..=20u32 {
            let outcome = reg.check_and_consume_quota(&id, 20, today).unwrap();
            assert_eq!(outcome, QuotaOutcome::Allowed { remaining: 20 - n });
        }

        // Call 21 hits the limit without consuming
        let outcome = reg.check_and_consume_quota(&id, 20, today).unwrap();
        assert_eq!(outcome, QuotaOutcome::LimitReached { limit: 20 });
    }

    #[test]
    fn test_quota_resets_on_new_day() {
        let reg = registry();
        let admin = IdentityId::from("admin");
        let id = IdentityId::from("7");

        reg.register(&id).unwrap();
        reg.approve(&admin, &id).unwrap();

        let monday = day("2024-03-04");
        for _ in 0..20 {
            reg.check_and_consume_quota(&id, 20, monday).unwrap();
        }
        assert_eq!(
            reg.check_and_consume_quota(&id, 20, monday).unwrap(),
            QuotaOutcome::LimitReached { limit: 20 }
        );

        // The next day behaves as call #1
        let tuesday = day("2024-03-05");
        assert_eq!(
            reg.check_and_consume_quota(&id, 20, tuesday).unwrap(),
            QuotaOutcome::Allowed { remaining: 19 }
        );
    }

    #[test]
    fn test_quota_limit_reached_does_not_write() {
        let reg = registry();
        let admin = IdentityId::from("admin");
        let id = IdentityId::from("7");
        let today = day("2024-03-01");

        reg.register(&id).unwrap();
        reg.approve(&admin, &id).unwrap();
        reg.check_and_consume_quota(&id, 1, today).unwrap();

        let writes = reg.store.write_count();
        reg.check_and_consume_quota(&id, 1, today).unwrap();
        assert_eq!(reg.store.write_count(), writes);
    }

    #[test]
    fn test_quota_unknown_identity() {
        let reg = registry();
        let err = reg
            .check_and_consume_quota(&IdentityId::from("ghost"), 20, day("2024-03-01"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_list_order_is_stable() {
        let reg = registry();
        for id in ["9", "3", "5"] {
            reg.register(&IdentityId::from(id)).unwrap();
        }

        let pending: Vec<String> = reg
            .list_pending()
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(pending, vec!["3", "5", "9"]);
    }
}
