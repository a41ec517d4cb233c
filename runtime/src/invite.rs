//! Invite codes: short, human-typeable public lookup keys for events.

use crate::environment::CheckinEnvironment;
use crate::metrics;
use checkin_core::error::InviteCodeError;
use checkin_core::store::InviteCodeAssignment;
use checkin_core::types::{EventId, EventRecord, InviteCode};

/// How many fresh codes to try before giving up on collisions.
pub const MAX_INVITE_CODE_ATTEMPTS: usize = 5;

/// Issues and resolves invite codes.
#[derive(Clone)]
pub struct InviteCodes {
    env: CheckinEnvironment,
}

impl InviteCodes {
    /// Create the service over the given environment.
    #[must_use]
    pub const fn new(env: CheckinEnvironment) -> Self {
        Self { env }
    }

    /// Generate a code and bind it to `event_id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: no such event
    /// - `Exhausted`: every generated code was already taken
    /// - `Storage`: storage failed
    #[tracing::instrument(skip_all, fields(%event_id))]
    pub async fn issue(&self, event_id: EventId) -> Result<InviteCode, InviteCodeError> {
        for attempt in 1..=MAX_INVITE_CODE_ATTEMPTS {
            let code = self.env.issuer.issue_invite_code();
            match self.env.events.assign_invite_code(event_id, &code).await? {
                InviteCodeAssignment::Assigned => {
                    metrics::record_invite_code_issued();
                    tracing::info!(%code, "Invite code issued");
                    return Ok(code);
                }
                InviteCodeAssignment::EventNotFound => {
                    return Err(InviteCodeError::EventNotFound(event_id));
                }
                InviteCodeAssignment::CodeTaken => {
                    tracing::debug!(attempt, "Invite code taken, drawing another");
                }
            }
        }

        tracing::warn!("No free invite code found");
        Err(InviteCodeError::Exhausted {
            attempts: MAX_INVITE_CODE_ATTEMPTS,
        })
    }

    /// Find the event behind a code as typed by a user.
    ///
    /// Input is normalized first; malformed input simply matches nothing.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if storage failed.
    pub async fn resolve(&self, input: &str) -> Result<Option<EventRecord>, InviteCodeError> {
        let Ok(code) = InviteCode::parse(input) else {
            return Ok(None);
        };
        Ok(self.env.events.find_event_by_invite_code(&code).await?)
    }
}
