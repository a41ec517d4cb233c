//! Post-event summary: GET /api/events/:event_id/summary

use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use checkin_core::types::EventId;
use checkin_runtime::AggregateSnapshot;
use uuid::Uuid;

/// Funnel counts, breakdowns and check-in velocity, computed on request.
///
/// # Errors
///
/// Returns 404 `EVENT_NOT_FOUND` for unknown events, 5xx if storage failed.
pub async fn summary(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AggregateSnapshot>, AppError> {
    let snapshot = state
        .analytics
        .summarize(EventId::from_uuid(event_id))
        .await?;
    Ok(Json(snapshot))
}
