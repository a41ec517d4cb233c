//! Invite-code endpoints.
//!
//! - POST /api/events/:event_id/invite-code - Issue (or replace) an event's code
//! - GET /api/invite-codes/:code - Resolve a code to its event

use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use checkin_core::types::{EventId, EventRecord, InviteCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A freshly issued invite code.
#[derive(Debug, Serialize, Deserialize)]
pub struct InviteCodeResponse {
    /// The event the code points at
    pub event_id: Uuid,
    /// The code
    pub code: InviteCode,
}

/// Issue a new invite code for an event.
///
/// # Errors
///
/// Returns 404 for unknown events, 503 if no free code could be found.
pub async fn issue(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<(StatusCode, Json<InviteCodeResponse>), AppError> {
    let code = state.invites.issue(EventId::from_uuid(event_id)).await?;
    Ok((StatusCode::CREATED, Json(InviteCodeResponse { event_id, code })))
}

/// Resolve a code as typed by a user. Case and surrounding whitespace are ignored.
///
/// # Errors
///
/// Returns 404 `INVITE_CODE_NOT_FOUND` if nothing matches.
pub async fn resolve(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<EventRecord>, AppError> {
    state
        .invites
        .resolve(&code)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("INVITE_CODE_NOT_FOUND", "No event uses this invite code"))
}
