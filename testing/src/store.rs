//! In-memory storage for fast, deterministic tests.
//!
//! [`InMemoryStore`] implements every storage trait of `checkin-core` over
//! plain `HashMap`s. Each operation runs inside one critical section, which
//! gives it the same all-or-nothing semantics the Postgres implementation
//! gets from a transaction. Clones share the same tables, so a store can be
//! handed to several services and spawned tasks at once.
//!
//! Faults can be injected to exercise the retry and error-propagation paths:
//! see [`InMemoryStore::fail_next_writes_with_conflict`] and
//! [`InMemoryStore::set_unavailable`].

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use checkin_core::error::StoreError;
use checkin_core::store::{
    CheckInOutcome, EventDirectory, IdentityDirectory, InsertOutcome, InviteCodeAssignment,
    RegistrationStore, StoreFuture,
};
use checkin_core::types::{
    ActiveCounts, Capacity, Credential, EventId, EventRecord, IdentityId, IdentityProfile,
    IdentityProjection, InviteCode, NewRegistration, Registration, RegistrationId,
    RegistrationStatus,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Tables {
    events: HashMap<EventId, EventRecord>,
    identities: HashMap<IdentityId, IdentityProjection>,
    identities_by_email: HashMap<String, IdentityId>,
    registrations: HashMap<RegistrationId, Registration>,
    by_credential: HashMap<Credential, RegistrationId>,
}

impl Tables {
    fn active_for_identity(&self, event_id: EventId, identity_id: IdentityId) -> Option<&Registration> {
        self.registrations.values().find(|r| {
            r.event_id == event_id && r.identity_id == identity_id && r.status.is_active()
        })
    }

    fn counts(&self, event_id: EventId) -> ActiveCounts {
        self.registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .fold(ActiveCounts::default(), |mut counts, r| {
                if r.status.is_active() {
                    counts.registered += 1;
                }
                if r.status == RegistrationStatus::CheckedIn {
                    counts.checked_in += 1;
                }
                counts
            })
    }
}

#[derive(Debug, Default)]
struct Faults {
    conflicts_remaining: usize,
    unavailable: bool,
}

/// In-memory implementation of [`RegistrationStore`], [`EventDirectory`] and
/// [`IdentityDirectory`].
///
/// # Example
///
/// ```
/// use checkin_testing::InMemoryStore;
/// use checkin_core::types::Capacity;
/// use checkin_core::store::RegistrationStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let event_id = store.create_event(Capacity::Limited(100));
///
/// let counts = store.count_active(event_id).await?;
/// assert_eq!(counts.registered, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event record
    pub fn add_event(&self, event: EventRecord) {
        self.tables.lock().unwrap().events.insert(event.id, event);
    }

    /// Create a published, public event with the given capacity
    #[must_use]
    pub fn create_event(&self, capacity: Capacity) -> EventId {
        let event = EventRecord::new(EventId::new(), capacity);
        let id = event.id;
        self.add_event(event);
        id
    }

    /// Synchronous find-or-create, for test setup
    #[must_use]
    pub fn add_identity(&self, profile: &IdentityProfile) -> IdentityId {
        let mut tables = self.tables.lock().unwrap();
        find_or_create(&mut tables, profile)
    }

    /// Every registration of an event, including cancelled ones
    #[must_use]
    pub fn registrations_for(&self, event_id: EventId) -> Vec<Registration> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<_> = tables
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        rows
    }

    /// Simulate the external cancellation path (`registered|checked_in → cancelled`).
    ///
    /// Returns `false` if the registration does not exist.
    pub fn cancel_registration(&self, id: RegistrationId) -> bool {
        let mut tables = self.tables.lock().unwrap();
        tables.registrations.get_mut(&id).is_some_and(|r| {
            r.status = RegistrationStatus::Cancelled;
            true
        })
    }

    /// Make the next `n` write operations fail with [`StoreError::Conflict`]
    pub fn fail_next_writes_with_conflict(&self, n: usize) {
        self.faults.lock().unwrap().conflicts_remaining = n;
    }

    /// Make every operation fail with [`StoreError::Unavailable`] until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unwrap().unavailable = unavailable;
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.faults.lock().unwrap().unavailable {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().unwrap();
        if faults.unavailable {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        if faults.conflicts_remaining > 0 {
            faults.conflicts_remaining -= 1;
            return Err(StoreError::Conflict("injected serialization failure".to_string()));
        }
        Ok(())
    }
}

fn find_or_create(tables: &mut Tables, profile: &IdentityProfile) -> IdentityId {
    let email = profile.normalized_email();
    if let Some(id) = tables.identities_by_email.get(&email) {
        return *id;
    }
    let id = IdentityId::new();
    tables.identities_by_email.insert(email, id);
    tables.identities.insert(id, IdentityProjection::from(profile));
    id
}

impl RegistrationStore for InMemoryStore {
    fn insert_registration(&self, registration: NewRegistration) -> StoreFuture<'_, InsertOutcome> {
        Box::pin(async move {
            self.check_write()?;
            let mut tables = self.tables.lock().unwrap();

            let Some(event) = tables.events.get(&registration.event_id) else {
                return Ok(InsertOutcome::EventNotFound);
            };
            let capacity = event.capacity;

            if let Some(existing) =
                tables.active_for_identity(registration.event_id, registration.identity_id)
            {
                return Ok(InsertOutcome::AlreadyRegistered(existing.clone()));
            }

            if capacity.is_full(tables.counts(registration.event_id).registered) {
                return Ok(InsertOutcome::EventFull { capacity });
            }

            if tables.by_credential.contains_key(&registration.credential) {
                return Ok(InsertOutcome::CredentialTaken);
            }

            let row = registration.into_registration();
            tables.by_credential.insert(row.credential.clone(), row.id);
            tables.registrations.insert(row.id, row.clone());
            Ok(InsertOutcome::Inserted(row))
        })
    }

    fn check_in(
        &self,
        credential: &Credential,
        event_id: EventId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, CheckInOutcome> {
        let credential = credential.clone();
        Box::pin(async move {
            self.check_write()?;
            let mut tables = self.tables.lock().unwrap();

            let Some(id) = tables.by_credential.get(&credential).copied() else {
                return Ok(CheckInOutcome::NotFound);
            };
            let Some(row) = tables.registrations.get_mut(&id) else {
                return Ok(CheckInOutcome::NotFound);
            };
            if row.event_id != event_id {
                return Ok(CheckInOutcome::NotFound);
            }

            Ok(match row.status {
                RegistrationStatus::Registered => {
                    row.status = RegistrationStatus::CheckedIn;
                    row.checked_in_at = Some(at);
                    CheckInOutcome::CheckedIn(row.clone())
                }
                RegistrationStatus::CheckedIn => CheckInOutcome::AlreadyCheckedIn(row.clone()),
                RegistrationStatus::Cancelled => CheckInOutcome::Cancelled(row.clone()),
            })
        })
    }

    fn count_active(&self, event_id: EventId) -> StoreFuture<'_, ActiveCounts> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.tables.lock().unwrap().counts(event_id))
        })
    }

    fn active_registrations(&self, event_id: EventId) -> StoreFuture<'_, Vec<Registration>> {
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().unwrap();
            let mut rows: Vec<_> = tables
                .registrations
                .values()
                .filter(|r| r.event_id == event_id && r.status.is_active())
                .cloned()
                .collect();
            rows.sort_by_key(|r| r.created_at);
            Ok(rows)
        })
    }

    fn get_registration(&self, id: RegistrationId) -> StoreFuture<'_, Option<Registration>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.tables.lock().unwrap().registrations.get(&id).cloned())
        })
    }
}

impl EventDirectory for InMemoryStore {
    fn get_event(&self, event_id: EventId) -> StoreFuture<'_, Option<EventRecord>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.tables.lock().unwrap().events.get(&event_id).cloned())
        })
    }

    fn assign_invite_code(
        &self,
        event_id: EventId,
        code: &InviteCode,
    ) -> StoreFuture<'_, InviteCodeAssignment> {
        let code = code.clone();
        Box::pin(async move {
            self.check_write()?;
            let mut tables = self.tables.lock().unwrap();

            let taken = tables
                .events
                .values()
                .any(|e| e.id != event_id && e.invite_code.as_ref() == Some(&code));
            if taken {
                return Ok(InviteCodeAssignment::CodeTaken);
            }

            match tables.events.get_mut(&event_id) {
                Some(event) => {
                    event.invite_code = Some(code);
                    Ok(InviteCodeAssignment::Assigned)
                }
                None => Ok(InviteCodeAssignment::EventNotFound),
            }
        })
    }

    fn find_event_by_invite_code(&self, code: &InviteCode) -> StoreFuture<'_, Option<EventRecord>> {
        let code = code.clone();
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().unwrap();
            Ok(tables
                .events
                .values()
                .find(|e| e.invite_code.as_ref() == Some(&code))
                .cloned())
        })
    }
}

impl IdentityDirectory for InMemoryStore {
    fn find_or_create_identity(&self, profile: &IdentityProfile) -> StoreFuture<'_, IdentityId> {
        let profile = profile.clone();
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().unwrap();
            Ok(find_or_create(&mut tables, &profile))
        })
    }

    fn identity_projection(&self, id: IdentityId) -> StoreFuture<'_, Option<IdentityProjection>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.tables.lock().unwrap().identities.get(&id).cloned())
        })
    }

    fn identity_projections(
        &self,
        ids: &[IdentityId],
    ) -> StoreFuture<'_, HashMap<IdentityId, IdentityProjection>> {
        let ids = ids.to_vec();
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().unwrap();
            Ok(ids
                .into_iter()
                .filter_map(|id| tables.identities.get(&id).map(|p| (id, p.clone())))
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::fixtures::profile;
    use checkin_core::credentials::issue_credential;

    fn new_registration(event_id: EventId, identity_id: IdentityId) -> NewRegistration {
        NewRegistration {
            id: RegistrationId::new(),
            event_id,
            identity_id,
            credential: issue_credential().unwrap(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_respects_capacity() {
        let store = InMemoryStore::new();
        let event_id = store.create_event(Capacity::Limited(1));
        let a = store.add_identity(&profile("a", None));
        let b = store.add_identity(&profile("b", None));

        let first = store.insert_registration(new_registration(event_id, a)).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let second = store.insert_registration(new_registration(event_id, b)).await.unwrap();
        assert_eq!(second, InsertOutcome::EventFull { capacity: Capacity::Limited(1) });
    }

    #[tokio::test]
    async fn cancelled_rows_free_their_seat() {
        let store = InMemoryStore::new();
        let event_id = store.create_event(Capacity::Limited(1));
        let a = store.add_identity(&profile("a", None));
        let b = store.add_identity(&profile("b", None));

        let InsertOutcome::Inserted(row) =
            store.insert_registration(new_registration(event_id, a)).await.unwrap()
        else {
            panic!("first insert should succeed");
        };
        assert!(store.cancel_registration(row.id));

        let outcome = store.insert_registration(new_registration(event_id, b)).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
    }

    #[tokio::test]
    async fn duplicate_credential_is_reported() {
        let store = InMemoryStore::new();
        let event_id = store.create_event(Capacity::Unbounded);
        let a = store.add_identity(&profile("a", None));
        let b = store.add_identity(&profile("b", None));

        let first = new_registration(event_id, a);
        let mut second = new_registration(event_id, b);
        second.credential = first.credential.clone();

        store.insert_registration(first).await.unwrap();
        let outcome = store.insert_registration(second).await.unwrap();
        assert_eq!(outcome, InsertOutcome::CredentialTaken);
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed() {
        let store = InMemoryStore::new();
        let event_id = store.create_event(Capacity::Unbounded);
        let a = store.add_identity(&profile("a", None));
        store.fail_next_writes_with_conflict(1);

        let err = store.insert_registration(new_registration(event_id, a)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let ok = store.insert_registration(new_registration(event_id, a)).await.unwrap();
        assert!(matches!(ok, InsertOutcome::Inserted(_)));
    }

    #[tokio::test]
    async fn identities_are_keyed_by_normalized_email() {
        let store = InMemoryStore::new();
        let mut upper = profile("ada", Some("Engineer"));
        upper.email = "ADA@example.com".to_string();

        let first = store.find_or_create_identity(&profile("ada", None)).await.unwrap();
        let second = store.find_or_create_identity(&upper).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invite_codes_are_unique_across_events() {
        let store = InMemoryStore::new();
        let first = store.create_event(Capacity::Unbounded);
        let second = store.create_event(Capacity::Unbounded);
        let code = InviteCode::parse("ABCDEFGH").unwrap();

        assert_eq!(
            store.assign_invite_code(first, &code).await.unwrap(),
            InviteCodeAssignment::Assigned
        );
        assert_eq!(
            store.assign_invite_code(second, &code).await.unwrap(),
            InviteCodeAssignment::CodeTaken
        );
        let found = store.find_event_by_invite_code(&code).await.unwrap().unwrap();
        assert_eq!(found.id, first);
    }
}
