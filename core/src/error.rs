//! Error taxonomy for registration, check-in and analytics.
//!
//! Every enum separates *business outcomes* (event full, already registered,
//! unknown credential, ...) from *infrastructure failures* (storage conflict,
//! storage unavailable). Callers render the former as ordinary user-facing
//! messages and treat only the latter as incidents; [`is_business_rule`]
//! helpers make that split explicit.
//!
//! [`is_business_rule`]: RegistrationError::is_business_rule

use crate::types::{Capacity, EventId, RegistrationId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors reported by storage back-ends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transient serialization failure or lock conflict. Safe to retry once.
    #[error("Storage conflict: {0}")]
    Conflict(String),

    /// Storage could not be reached or returned an unexpected failure.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by `RegistrationLedger::register`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// No event with this identifier exists.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Every seat is taken by an active registration.
    #[error("Event {event_id} is full ({capacity:?})")]
    EventFull {
        /// The event that rejected the registration
        event_id: EventId,
        /// Its ceiling
        capacity: Capacity,
    },

    /// The identity already holds an active registration for this event.
    #[error("Already registered for this event (registration {existing})")]
    AlreadyRegistered {
        /// The registration that is already active
        existing: RegistrationId,
    },

    /// A storage conflict persisted after the automatic retry.
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    /// Storage failed; the outcome of the request is unknown.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// No credential could be produced (entropy source failure or repeated collisions).
    #[error("Credential issuance failed: {0}")]
    CredentialIssuance(String),
}

impl RegistrationError {
    /// True for expected, user-facing outcomes that must not be logged as bugs.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound(_) | Self::EventFull { .. } | Self::AlreadyRegistered { .. }
        )
    }
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::StorageConflict(msg),
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}

/// Errors returned by `CheckInProcessor::check_in`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckInError {
    /// No registration for this event carries the credential.
    #[error("Credential not found for this event")]
    CredentialNotFound,

    /// The credential was already used. Carries who it was and when.
    #[error("{attendee_name} already checked in at {checked_in_at}")]
    AlreadyCheckedIn {
        /// Display name of the attendee
        attendee_name: String,
        /// Time of the original, successful check-in
        checked_in_at: DateTime<Utc>,
    },

    /// The registration behind the credential was cancelled.
    #[error("Registration was cancelled")]
    RegistrationCancelled,

    /// Transient storage conflict.
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    /// Storage failed; the outcome of the scan is unknown.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl CheckInError {
    /// True for expected, user-facing outcomes that must not be logged as bugs.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::CredentialNotFound | Self::AlreadyCheckedIn { .. } | Self::RegistrationCancelled
        )
    }
}

impl From<StoreError> for CheckInError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::StorageConflict(msg),
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}

/// Errors returned by `AnalyticsAggregator::summarize`.
///
/// An event with no registrations is *not* an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// No event with this identifier exists.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Transient storage conflict.
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    /// Storage failed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl AnalyticsError {
    /// True for expected, user-facing outcomes.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        matches!(self, Self::EventNotFound(_))
    }
}

impl From<StoreError> for AnalyticsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::StorageConflict(msg),
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}

/// Errors returned when issuing or resolving invite codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InviteCodeError {
    /// No event with this identifier exists.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Every generated code collided with an existing one.
    #[error("Could not find a free invite code after {attempts} attempts")]
    Exhausted {
        /// How many codes were tried
        attempts: usize,
    },

    /// Storage failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl InviteCodeError {
    /// True for expected, user-facing outcomes.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        matches!(self, Self::EventNotFound(_))
    }
}
