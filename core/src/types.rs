//! Domain types for event registration and check-in.
//!
//! Identifiers, credentials, capacity, and the registration record itself.
//! Attendee identities are owned by the surrounding profile system; this crate
//! only keeps an opaque [`IdentityId`] plus a read-only [`IdentityProjection`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an attendee identity (owned by the profile system)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId(Uuid);

impl IdentityId {
    /// Creates a new random `IdentityId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `IdentityId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    /// Creates a new random `RegistrationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RegistrationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Opaque check-in token bound to exactly one registration.
///
/// Globally unique across all events. Never derived from the event or the
/// attendee; see [`crate::credentials::issue_credential`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a scanned or stored token. Surrounding whitespace is dropped,
    /// since scanners and copy-paste routinely add it.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.len() == token.len() {
            Self(token)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Borrow the token
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if nothing was scanned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short, human-typeable public lookup key for an event.
///
/// Not a security credential: lower entropy is acceptable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Minimum accepted code length
    pub const MIN_LEN: usize = 6;
    /// Maximum accepted code length
    pub const MAX_LEN: usize = 8;

    /// Parse a user-entered code: trims, uppercases, then validates
    /// length and the uppercase-alphanumeric alphabet.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInviteCode`] if the normalized input is not 6–8
    /// ASCII alphanumeric characters.
    pub fn parse(input: &str) -> Result<Self, InvalidInviteCode> {
        let code = input.trim().to_ascii_uppercase();
        let valid_len = (Self::MIN_LEN..=Self::MAX_LEN).contains(&code.len());
        if valid_len && code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(code))
        } else {
            Err(InvalidInviteCode(input.to_string()))
        }
    }

    /// Borrow the code
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a code produced by the issuer. Callers outside this crate go
    /// through [`InviteCode::parse`].
    pub(crate) const fn from_generated(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InviteCode {
    type Err = InvalidInviteCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A string that is not a well-formed invite code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid invite code: {0:?}")]
pub struct InvalidInviteCode(pub String);

// ============================================================================
// Events
// ============================================================================

/// Registration ceiling for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "seats")]
pub enum Capacity {
    /// At most this many active registrations
    Limited(u32),
    /// No ceiling
    Unbounded,
}

impl Capacity {
    /// Build a limited capacity. Zero is not a valid ceiling.
    #[must_use]
    pub const fn limited(seats: u32) -> Option<Self> {
        if seats == 0 {
            None
        } else {
            Some(Self::Limited(seats))
        }
    }

    /// The ceiling, if any
    #[must_use]
    pub const fn seats(self) -> Option<u32> {
        match self {
            Self::Limited(n) => Some(n),
            Self::Unbounded => None,
        }
    }

    /// True if `active` registrations leave no room for another one
    #[must_use]
    pub const fn is_full(self, active: u64) -> bool {
        match self {
            Self::Limited(n) => active >= n as u64,
            Self::Unbounded => false,
        }
    }
}

/// Publication status of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Not yet visible to attendees
    Draft,
    /// Open for discovery
    Published,
}

/// Who can discover an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVisibility {
    /// Listed publicly
    Public,
    /// Reachable through the invite code only
    Private,
}

/// The slice of event metadata the registration core reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event identifier
    pub id: EventId,
    /// Registration ceiling
    pub capacity: Capacity,
    /// Draft or published
    pub status: EventStatus,
    /// Public or private
    pub visibility: EventVisibility,
    /// Public lookup key, once issued
    pub invite_code: Option<InviteCode>,
}

impl EventRecord {
    /// A published, public event with the given capacity and no invite code yet
    #[must_use]
    pub fn new(id: EventId, capacity: Capacity) -> Self {
        Self {
            id,
            capacity,
            status: EventStatus::Published,
            visibility: EventVisibility::Public,
            invite_code: None,
        }
    }
}

// ============================================================================
// Registrations
// ============================================================================

/// Lifecycle of a registration.
///
/// `Registered → CheckedIn` is performed by the check-in processor.
/// `Cancelled` is written by an external path and only tolerated here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Holding a seat, not yet scanned
    Registered,
    /// Scanned at the door
    CheckedIn,
    /// Released; does not count against capacity
    Cancelled,
}

impl RegistrationStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::CheckedIn => "checked_in",
            Self::Cancelled => "cancelled",
        }
    }

    /// Counts against capacity
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Registered | Self::CheckedIn)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(Self::Registered),
            "checked_in" => Ok(Self::CheckedIn),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A status string that storage returned but the domain does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown registration status: {0:?}")]
pub struct UnknownStatus(pub String);

/// One attendee's registration for one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration identifier
    pub id: RegistrationId,
    /// Event this registration belongs to
    pub event_id: EventId,
    /// Attendee identity
    pub identity_id: IdentityId,
    /// Current lifecycle state
    pub status: RegistrationStatus,
    /// Check-in token, unique system-wide
    pub credential: Credential,
    /// When the registration was written
    pub created_at: DateTime<Utc>,
    /// When the attendee was checked in, if ever
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// A registration the ledger wants storage to insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRegistration {
    /// Pre-allocated identifier
    pub id: RegistrationId,
    /// Target event
    pub event_id: EventId,
    /// Attendee identity
    pub identity_id: IdentityId,
    /// Freshly issued credential
    pub credential: Credential,
    /// Insert timestamp
    pub created_at: DateTime<Utc>,
}

impl NewRegistration {
    /// The row as it will look once inserted
    #[must_use]
    pub fn into_registration(self) -> Registration {
        Registration {
            id: self.id,
            event_id: self.event_id,
            identity_id: self.identity_id,
            status: RegistrationStatus::Registered,
            credential: self.credential,
            created_at: self.created_at,
            checked_in_at: None,
        }
    }
}

/// Active-registration counts for one event, read in one snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCounts {
    /// Registrations in `registered` or `checked_in`
    pub registered: u64,
    /// Registrations in `checked_in`
    pub checked_in: u64,
}

// ============================================================================
// Identities
// ============================================================================

/// Profile fields supplied when an attendee signs up.
///
/// `email` is the stable lookup key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    /// Contact email (lookup key)
    pub email: String,
    /// Display name
    pub name: String,
    /// Employer
    pub company: Option<String>,
    /// Role
    pub job_title: Option<String>,
}

impl IdentityProfile {
    /// Email in the form used for uniqueness: trimmed, lowercased
    #[must_use]
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// Read-only view of an identity used for operator feedback and grouping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProjection {
    /// Display name
    pub name: String,
    /// Employer
    pub company: Option<String>,
    /// Role
    pub job_title: Option<String>,
}

impl From<&IdentityProfile> for IdentityProjection {
    fn from(profile: &IdentityProfile) -> Self {
        Self {
            name: profile.name.clone(),
            company: profile.company.clone(),
            job_title: profile.job_title.clone(),
        }
    }
}
