//! Check-in: the exactly-once `registered → checked_in` transition.
//!
//! A scan is looked up by credential *and* event, so a credential only works
//! at the event it was issued for. The transition itself is a compare-and-swap
//! in storage, conditioned on the prior status being exactly `registered`;
//! of two simultaneous scans of the same badge one wins and the other is told
//! who already came in and when.
//!
//! Failed check-ins are terminal, user-visible outcomes. Nothing here retries.
//!
//! The attendee's name is read after the transition has been decided, so a
//! profile lookup failure never changes the outcome of a scan; the operator
//! is shown a placeholder name instead.

use crate::environment::CheckinEnvironment;
use crate::metrics;
use checkin_core::error::CheckInError;
use checkin_core::store::CheckInOutcome;
use checkin_core::types::{Credential, EventId, IdentityId, RegistrationId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Shown to the operator when the attendee's profile is missing or unreadable.
pub const UNKNOWN_ATTENDEE: &str = "Unknown attendee";

/// Operator feedback for a successful scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckInReceipt {
    /// The registration that was checked in
    pub registration_id: RegistrationId,
    /// Who to greet
    pub attendee_name: String,
    /// When the transition was recorded
    pub checked_in_at: DateTime<Utc>,
}

/// Consumes scanned credentials.
#[derive(Clone)]
pub struct CheckInProcessor {
    env: CheckinEnvironment,
}

impl CheckInProcessor {
    /// Create a processor over the given environment.
    #[must_use]
    pub const fn new(env: CheckinEnvironment) -> Self {
        Self { env }
    }

    /// Check in whoever holds `credential` at `event_id`.
    ///
    /// Surrounding whitespace from the scanner is ignored.
    ///
    /// # Errors
    ///
    /// - `CredentialNotFound`: no registration for this event carries the credential
    /// - `AlreadyCheckedIn`: the credential was used before; carries the
    ///   attendee's name and the original check-in time
    /// - `RegistrationCancelled`: the registration was cancelled
    /// - `StorageConflict` / `StorageUnavailable`: storage failed
    #[tracing::instrument(skip_all, fields(%event_id))]
    pub async fn check_in(
        &self,
        credential: &Credential,
        event_id: EventId,
    ) -> Result<CheckInReceipt, CheckInError> {
        let result = self.try_check_in(credential, event_id).await;

        match &result {
            Ok(receipt) => {
                metrics::record_check_in("checked_in");
                tracing::info!(registration_id = %receipt.registration_id, "Checked in");
            }
            Err(err) => {
                metrics::record_check_in(outcome_label(err));
                if err.is_business_rule() {
                    tracing::debug!(error = %err, "Check-in rejected");
                } else {
                    tracing::error!(error = %err, "Check-in failed");
                }
            }
        }

        result
    }

    async fn try_check_in(
        &self,
        credential: &Credential,
        event_id: EventId,
    ) -> Result<CheckInReceipt, CheckInError> {
        let credential = Credential::new(credential.as_str());
        if credential.is_empty() {
            return Err(CheckInError::CredentialNotFound);
        }

        let now = self.env.clock.now();
        match self.env.registrations.check_in(&credential, event_id, now).await? {
            CheckInOutcome::CheckedIn(registration) => Ok(CheckInReceipt {
                registration_id: registration.id,
                attendee_name: self.attendee_name(registration.identity_id).await,
                checked_in_at: registration.checked_in_at.unwrap_or(now),
            }),
            CheckInOutcome::AlreadyCheckedIn(registration) => {
                let attendee_name = self.attendee_name(registration.identity_id).await;
                Err(CheckInError::AlreadyCheckedIn {
                    attendee_name,
                    checked_in_at: registration.checked_in_at.unwrap_or(registration.created_at),
                })
            }
            CheckInOutcome::Cancelled(_) => Err(CheckInError::RegistrationCancelled),
            CheckInOutcome::NotFound => Err(CheckInError::CredentialNotFound),
        }
    }

    async fn attendee_name(&self, identity_id: IdentityId) -> String {
        let projection = match self.env.identities.identity_projection(identity_id).await {
            Ok(projection) => projection,
            Err(err) => {
                tracing::warn!(%identity_id, error = %err, "Attendee profile unavailable");
                None
            }
        };
        projection
            .map(|p| p.name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ATTENDEE.to_string())
    }
}

const fn outcome_label(err: &CheckInError) -> &'static str {
    match err {
        CheckInError::CredentialNotFound => "not_found",
        CheckInError::AlreadyCheckedIn { .. } => "already_checked_in",
        CheckInError::RegistrationCancelled => "cancelled",
        CheckInError::StorageConflict(_) | CheckInError::StorageUnavailable(_) => "error",
    }
}
