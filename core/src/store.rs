//! Storage seams for the registration core.
//!
//! The registration table is the only shared mutable state in the system.
//! Request handlers are stateless and may run in different processes, so no
//! in-process lock can protect it: every invariant is enforced by the store
//! implementation at commit time.
//!
//! - [`RegistrationStore`]: the ledger table. Its write operations are
//!   *atomic conditional writes*, never read-then-write pairs.
//! - [`EventDirectory`]: the event-metadata collaborator (capacity, invite codes).
//! - [`IdentityDirectory`]: the profile collaborator (find-or-create, projections).
//!
//! # Implementations
//!
//! - `PostgresStore` (in `checkin-postgres`): production implementation
//! - `InMemoryStore` (in `checkin-testing`): fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! services can hold `Arc<dyn RegistrationStore>`.

use crate::error::StoreError;
use crate::types::{
    ActiveCounts, Capacity, Credential, EventId, EventRecord, IdentityId, IdentityProfile,
    IdentityProjection, InviteCode, NewRegistration, Registration, RegistrationId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every storage method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Result of the atomic capacity-checked insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written with status `registered`.
    Inserted(Registration),
    /// The event does not exist.
    EventNotFound,
    /// Active registrations already fill the event.
    EventFull {
        /// The event's ceiling at the time of the insert
        capacity: Capacity,
    },
    /// The identity already holds an active registration for the event.
    AlreadyRegistered(Registration),
    /// The credential collided with an existing one; nothing was written.
    CredentialTaken,
}

/// Result of the compare-and-swap `registered → checked_in`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// This call performed the transition.
    CheckedIn(Registration),
    /// Another call already performed it; the row is returned unchanged.
    AlreadyCheckedIn(Registration),
    /// The registration was cancelled externally.
    Cancelled(Registration),
    /// No registration for this event carries the credential.
    NotFound,
}

/// Result of binding an invite code to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteCodeAssignment {
    /// The code now belongs to the event.
    Assigned,
    /// Another event already owns the code; nothing was written.
    CodeTaken,
    /// The event does not exist.
    EventNotFound,
}

/// The registration table.
///
/// # Atomicity contract
///
/// - [`insert_registration`](Self::insert_registration) evaluates event
///   existence, the one-active-registration-per-identity rule, the capacity
///   ceiling and the insert as a single indivisible step per event. Two
///   concurrent inserts for the last seat must never both succeed.
/// - [`check_in`](Self::check_in) conditions the status update on the prior
///   status being exactly `registered`. Two concurrent scans of the same
///   credential must never both observe [`CheckInOutcome::CheckedIn`].
///
/// A transient serialization failure is reported as [`StoreError::Conflict`];
/// callers may retry once.
pub trait RegistrationStore: Send + Sync {
    /// Insert a registration if the event has room and the identity is not
    /// already actively registered.
    ///
    /// # Errors
    ///
    /// - `Conflict`: the storage layer aborted the transaction (safe to retry)
    /// - `Unavailable`: storage failed; outcome unknown
    fn insert_registration(&self, registration: NewRegistration) -> StoreFuture<'_, InsertOutcome>;

    /// Transition the registration bound to `(credential, event_id)` from
    /// `registered` to `checked_in`, recording `at`.
    ///
    /// # Errors
    ///
    /// - `Conflict`: the storage layer aborted the update
    /// - `Unavailable`: storage failed; outcome unknown
    fn check_in(
        &self,
        credential: &Credential,
        event_id: EventId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, CheckInOutcome>;

    /// Count active registrations for an event in one consistent read.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn count_active(&self, event_id: EventId) -> StoreFuture<'_, ActiveCounts>;

    /// All active (`registered` or `checked_in`) registrations for an event,
    /// read in one consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn active_registrations(&self, event_id: EventId) -> StoreFuture<'_, Vec<Registration>>;

    /// Load a single registration by id, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn get_registration(&self, id: RegistrationId) -> StoreFuture<'_, Option<Registration>>;
}

/// Event metadata owned by the surrounding event store.
pub trait EventDirectory: Send + Sync {
    /// Load an event, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn get_event(&self, event_id: EventId) -> StoreFuture<'_, Option<EventRecord>>;

    /// Bind `code` to `event_id`, replacing any previous code of that event.
    /// Codes are unique across events.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn assign_invite_code(
        &self,
        event_id: EventId,
        code: &InviteCode,
    ) -> StoreFuture<'_, InviteCodeAssignment>;

    /// Find the event that owns an invite code.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn find_event_by_invite_code(&self, code: &InviteCode) -> StoreFuture<'_, Option<EventRecord>>;
}

/// Attendee identities owned by the surrounding profile system.
pub trait IdentityDirectory: Send + Sync {
    /// Look an identity up by (normalized) email, creating it if absent.
    /// Concurrent calls with the same email resolve to the same identity.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn find_or_create_identity(&self, profile: &IdentityProfile) -> StoreFuture<'_, IdentityId>;

    /// Read-only projection of one identity.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn identity_projection(&self, id: IdentityId) -> StoreFuture<'_, Option<IdentityProjection>>;

    /// Batch variant of [`identity_projection`](Self::identity_projection).
    /// Unknown identities are simply absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage failed.
    fn identity_projections(
        &self,
        ids: &[IdentityId],
    ) -> StoreFuture<'_, HashMap<IdentityId, IdentityProjection>>;
}
