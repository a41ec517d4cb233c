//! Registration ledger: the single source of truth for who is registered for what.
//!
//! # Invariants
//!
//! - At most one active registration per (event, identity).
//! - Active registrations never exceed the event's capacity.
//! - Every registration carries a credential unique across the whole system.
//!
//! None of these are checked here with a read followed by a write. The ledger
//! hands the store a fully formed row and the store evaluates existence,
//! duplicates, capacity and the insert as one atomic step
//! ([`RegistrationStore::insert_registration`]). The ledger only interprets
//! the outcome, re-issues a credential on the (astronomically rare) collision,
//! and retries once on a storage conflict.
//!
//! Retrying is always safe: a `register` whose first attempt actually
//! committed resolves to `AlreadyRegistered` on the second.
//!
//! [`RegistrationStore::insert_registration`]: checkin_core::store::RegistrationStore::insert_registration

use crate::environment::CheckinEnvironment;
use crate::metrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use checkin_core::error::RegistrationError;
use checkin_core::store::InsertOutcome;
use checkin_core::types::{
    ActiveCounts, EventId, IdentityId, IdentityProfile, NewRegistration, Registration,
    RegistrationId,
};

/// How many fresh credentials to try before giving up on collisions.
pub const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Capacity-aware registration service.
#[derive(Clone)]
pub struct RegistrationLedger {
    env: CheckinEnvironment,
    retry: RetryPolicy,
}

impl RegistrationLedger {
    /// Create a ledger that retries storage conflicts once.
    #[must_use]
    pub fn new(env: CheckinEnvironment) -> Self {
        Self {
            env,
            retry: RetryPolicy::single_retry(),
        }
    }

    /// Override the conflict retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register `identity_id` for `event_id`.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: no such event
    /// - `EventFull`: active registrations already reach capacity
    /// - `AlreadyRegistered`: the identity already holds an active registration
    /// - `StorageConflict`: storage kept aborting the transaction after one retry
    /// - `StorageUnavailable`: storage failed; the outcome is unknown
    /// - `CredentialIssuance`: no credential could be produced
    #[tracing::instrument(skip_all, fields(%event_id, %identity_id))]
    pub async fn register(
        &self,
        event_id: EventId,
        identity_id: IdentityId,
    ) -> Result<Registration, RegistrationError> {
        let result = retry_with_predicate(
            self.retry.clone(),
            || self.try_register(event_id, identity_id),
            |err: &RegistrationError| matches!(err, RegistrationError::StorageConflict(_)),
        )
        .await;

        match &result {
            Ok(registration) => {
                metrics::record_registration("registered");
                tracing::info!(registration_id = %registration.id, "Registered");
            }
            Err(err) => {
                metrics::record_registration(outcome_label(err));
                if err.is_business_rule() {
                    tracing::debug!(error = %err, "Registration rejected");
                } else {
                    tracing::error!(error = %err, "Registration failed");
                }
            }
        }

        result
    }

    /// Resolve the attendee through the profile collaborator (creating the
    /// identity if this email is new), then [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register); a profile-store failure is
    /// reported as `StorageUnavailable`/`StorageConflict`.
    pub async fn register_profile(
        &self,
        event_id: EventId,
        profile: &IdentityProfile,
    ) -> Result<Registration, RegistrationError> {
        let identity_id = self.env.identities.find_or_create_identity(profile).await?;
        self.register(event_id, identity_id).await
    }

    /// Active-registration counts for an event, read in one snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable`/`StorageConflict` if storage failed.
    pub async fn count_active(&self, event_id: EventId) -> Result<ActiveCounts, RegistrationError> {
        Ok(self.env.registrations.count_active(event_id).await?)
    }

    /// Load one registration, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable`/`StorageConflict` if storage failed.
    pub async fn registration(
        &self,
        id: RegistrationId,
    ) -> Result<Option<Registration>, RegistrationError> {
        Ok(self.env.registrations.get_registration(id).await?)
    }

    async fn try_register(
        &self,
        event_id: EventId,
        identity_id: IdentityId,
    ) -> Result<Registration, RegistrationError> {
        for attempt in 1..=MAX_CREDENTIAL_ATTEMPTS {
            let credential = self
                .env
                .issuer
                .issue_credential()
                .map_err(|e| RegistrationError::CredentialIssuance(e.to_string()))?;

            let row = NewRegistration {
                id: RegistrationId::new(),
                event_id,
                identity_id,
                credential,
                created_at: self.env.clock.now(),
            };

            match self.env.registrations.insert_registration(row).await? {
                InsertOutcome::Inserted(registration) => return Ok(registration),
                InsertOutcome::EventNotFound => {
                    return Err(RegistrationError::EventNotFound(event_id));
                }
                InsertOutcome::EventFull { capacity } => {
                    return Err(RegistrationError::EventFull { event_id, capacity });
                }
                InsertOutcome::AlreadyRegistered(existing) => {
                    return Err(RegistrationError::AlreadyRegistered {
                        existing: existing.id,
                    });
                }
                InsertOutcome::CredentialTaken => {
                    tracing::warn!(attempt, "Credential collision, issuing a new one");
                }
            }
        }

        Err(RegistrationError::CredentialIssuance(format!(
            "credential collided {MAX_CREDENTIAL_ATTEMPTS} times"
        )))
    }
}

const fn outcome_label(err: &RegistrationError) -> &'static str {
    match err {
        RegistrationError::EventNotFound(_) => "event_not_found",
        RegistrationError::EventFull { .. } => "event_full",
        RegistrationError::AlreadyRegistered { .. } => "already_registered",
        RegistrationError::StorageConflict(_)
        | RegistrationError::StorageUnavailable(_)
        | RegistrationError::CredentialIssuance(_) => "error",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use checkin_core::environment::Clock;
    use checkin_core::types::{Capacity, RegistrationStatus};
    use checkin_testing::fixtures::profile;
    use checkin_testing::{InMemoryStore, ScriptedIssuer, test_clock};
    use std::sync::Arc;

    fn ledger_for(store: &Arc<InMemoryStore>) -> RegistrationLedger {
        let env = CheckinEnvironment::from_store(store.clone()).with_clock(Arc::new(test_clock()));
        RegistrationLedger::new(env)
    }

    #[tokio::test]
    async fn registers_with_fresh_credential() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Limited(10));
        let ledger = ledger_for(&store);

        let registration = ledger
            .register_profile(event_id, &profile("Ada", Some("Engineer")))
            .await
            .unwrap();

        assert_eq!(registration.status, RegistrationStatus::Registered);
        assert_eq!(registration.event_id, event_id);
        assert_eq!(registration.created_at, test_clock().now());
        assert!(registration.checked_in_at.is_none());
        assert_eq!(
            registration.credential.as_str().len(),
            checkin_core::credentials::CREDENTIAL_LEN
        );
    }

    #[tokio::test]
    async fn unknown_event_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = ledger_for(&store);
        let missing = EventId::new();

        let err = ledger.register(missing, IdentityId::new()).await.unwrap_err();
        assert_eq!(err, RegistrationError::EventNotFound(missing));
    }

    #[tokio::test]
    async fn second_registration_for_same_identity_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let identity = store.add_identity(&profile("Ada", None));
        let ledger = ledger_for(&store);

        let first = ledger.register(event_id, identity).await.unwrap();
        let err = ledger.register(event_id, identity).await.unwrap_err();
        assert_eq!(err, RegistrationError::AlreadyRegistered { existing: first.id });
    }

    #[tokio::test]
    async fn identity_may_register_again_after_cancellation() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Limited(1));
        let identity = store.add_identity(&profile("Ada", None));
        let ledger = ledger_for(&store);

        let first = ledger.register(event_id, identity).await.unwrap();
        store.cancel_registration(first.id);

        let second = ledger.register(event_id, identity).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_ne!(first.credential, second.credential);
    }

    #[tokio::test]
    async fn conflict_is_retried_once() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let identity = store.add_identity(&profile("Ada", None));
        let ledger = ledger_for(&store);

        store.fail_next_writes_with_conflict(1);
        assert!(ledger.register(event_id, identity).await.is_ok());
    }

    #[tokio::test]
    async fn persistent_conflict_surfaces_as_storage_conflict() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let identity = store.add_identity(&profile("Ada", None));
        let ledger = ledger_for(&store);

        store.fail_next_writes_with_conflict(2);
        let err = ledger.register(event_id, identity).await.unwrap_err();
        assert!(matches!(err, RegistrationError::StorageConflict(_)));
        assert!(!err.is_business_rule());
        assert!(store.registrations_for(event_id).is_empty());
    }

    #[tokio::test]
    async fn conflict_is_not_retried_without_a_policy() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let identity = store.add_identity(&profile("Ada", None));
        let ledger = ledger_for(&store).with_retry_policy(RetryPolicy::none());

        store.fail_next_writes_with_conflict(1);
        let err = ledger.register(event_id, identity).await.unwrap_err();
        assert!(matches!(err, RegistrationError::StorageConflict(_)));
    }

    #[tokio::test]
    async fn registration_is_readable_after_cancellation() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let ledger = ledger_for(&store);

        let registration = ledger.register_profile(event_id, &profile("Ada", None)).await.unwrap();
        store.cancel_registration(registration.id);

        let loaded = ledger.registration(registration.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RegistrationStatus::Cancelled);
        assert!(ledger.registration(RegistrationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unavailable_storage_is_not_a_business_rule() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let identity = store.add_identity(&profile("Ada", None));
        let ledger = ledger_for(&store);

        store.set_unavailable(true);
        let err = ledger.register(event_id, identity).await.unwrap_err();
        assert!(matches!(err, RegistrationError::StorageUnavailable(_)));
        assert!(!err.is_business_rule());
    }

    #[tokio::test]
    async fn credential_collision_reissues() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let a = store.add_identity(&profile("Ada", None));
        let b = store.add_identity(&profile("Bob", None));

        let issuer = ScriptedIssuer::new(["same-token", "same-token", "other-token"]);
        let env = CheckinEnvironment::from_store(store.clone()).with_issuer(Arc::new(issuer));
        let ledger = RegistrationLedger::new(env);

        ledger.register(event_id, a).await.unwrap();
        let second = ledger.register(event_id, b).await.unwrap();
        assert_eq!(second.credential.as_str(), "other-token");
    }

    #[tokio::test]
    async fn repeated_collisions_give_up() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let a = store.add_identity(&profile("Ada", None));
        let b = store.add_identity(&profile("Bob", None));

        let issuer = ScriptedIssuer::new(["dup", "dup", "dup", "dup"]);
        let env = CheckinEnvironment::from_store(store.clone()).with_issuer(Arc::new(issuer));
        let ledger = RegistrationLedger::new(env);

        ledger.register(event_id, a).await.unwrap();
        let err = ledger.register(event_id, b).await.unwrap_err();
        assert!(matches!(err, RegistrationError::CredentialIssuance(_)));
    }

    #[tokio::test]
    async fn entropy_failure_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let identity = store.add_identity(&profile("Ada", None));
        let env = CheckinEnvironment::from_store(store.clone())
            .with_issuer(Arc::new(ScriptedIssuer::broken()));
        let ledger = RegistrationLedger::new(env);

        let err = ledger.register(event_id, identity).await.unwrap_err();
        assert!(matches!(err, RegistrationError::CredentialIssuance(_)));
        assert!(!err.is_business_rule());
        assert!(store.registrations_for(event_id).is_empty());
    }

    #[tokio::test]
    async fn counts_ignore_cancelled_rows() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = store.create_event(Capacity::Unbounded);
        let ledger = ledger_for(&store);

        let kept = ledger.register_profile(event_id, &profile("Ada", None)).await.unwrap();
        let dropped = ledger.register_profile(event_id, &profile("Bob", None)).await.unwrap();
        store.cancel_registration(dropped.id);

        let counts = ledger.count_active(event_id).await.unwrap();
        assert_eq!(counts, ActiveCounts { registered: 1, checked_in: 0 });
        assert_ne!(kept.id, dropped.id);
    }
}
