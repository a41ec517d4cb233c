//! Door scan endpoint: POST /api/events/:event_id/check-ins

use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use checkin_core::types::{Credential, EventId};
use checkin_runtime::CheckInReceipt;
use serde::Deserialize;
use uuid::Uuid;

/// A scanned credential.
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    /// Token as read by the scanner; surrounding whitespace is ignored
    pub credential: String,
}

/// Check in the registration behind a scanned credential.
///
/// A repeat scan answers 409 `ALREADY_CHECKED_IN` with the attendee name and
/// original time in `details`; a cancelled registration answers 410.
///
/// # Errors
///
/// Returns [`AppError`] for every check-in error.
pub async fn check_in(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<CheckInReceipt>, AppError> {
    let credential = Credential::new(request.credential);
    let receipt = state
        .checkins
        .check_in(&credential, EventId::from_uuid(event_id))
        .await?;

    Ok(Json(receipt))
}
