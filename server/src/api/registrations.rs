//! Registration endpoints.
//!
//! - POST /api/events/:event_id/registrations - Register an attendee
//! - GET /api/events/:event_id/counts - Active registration counts
//! - GET /api/registrations/:registration_id - Look a registration up

use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use checkin_core::types::{
    ActiveCounts, Credential, EventId, IdentityProfile, Registration, RegistrationId,
    RegistrationStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to register for an event.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Contact email, the identity lookup key
    pub email: String,
    /// Display name
    pub name: String,
    /// Employer
    #[serde(default)]
    pub company: Option<String>,
    /// Role
    #[serde(default)]
    pub job_title: Option<String>,
}

impl RegisterRequest {
    fn into_profile(self) -> Result<IdentityProfile, AppError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("A valid email is required"));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Name is required"));
        }

        Ok(IdentityProfile {
            email: email.to_string(),
            name: self.name.trim().to_string(),
            company: self.company,
            job_title: self.job_title,
        })
    }
}

/// A registration as returned to the attendee.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    /// Registration identifier
    pub registration_id: Uuid,
    /// Event identifier
    pub event_id: Uuid,
    /// Lifecycle state
    pub status: RegistrationStatus,
    /// Check-in token to present at the door
    pub credential: Credential,
    /// When the registration was written
    pub created_at: DateTime<Utc>,
    /// When the attendee was checked in, if ever
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl From<Registration> for RegistrationResponse {
    fn from(registration: Registration) -> Self {
        Self {
            registration_id: *registration.id.as_uuid(),
            event_id: *registration.event_id.as_uuid(),
            status: registration.status,
            credential: registration.credential,
            created_at: registration.created_at,
            checked_in_at: registration.checked_in_at,
        }
    }
}

/// Live counts for an event.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountsResponse {
    /// Event identifier
    pub event_id: Uuid,
    /// Active registrations
    pub registered: u64,
    /// Checked-in registrations
    pub checked_in: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register an attendee for an event.
///
/// Returns 201 with the issued credential. Business rejections map to
/// 404 `EVENT_NOT_FOUND`, 409 `EVENT_FULL` and 409 `ALREADY_REGISTERED`.
///
/// # Errors
///
/// Returns [`AppError`] for validation failures and every registration error.
pub async fn register(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let profile = request.into_profile()?;
    let registration = state
        .ledger
        .register_profile(EventId::from_uuid(event_id), &profile)
        .await?;

    Ok((StatusCode::CREATED, Json(registration.into())))
}

/// Active registration counts for an event.
///
/// # Errors
///
/// Returns [`AppError`] if storage failed.
pub async fn counts(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<CountsResponse>, AppError> {
    let ActiveCounts {
        registered,
        checked_in,
    } = state.ledger.count_active(EventId::from_uuid(event_id)).await?;

    Ok(Json(CountsResponse {
        event_id,
        registered,
        checked_in,
    }))
}

/// Look a registration up by id, whatever its status.
///
/// # Errors
///
/// Returns 404 `REGISTRATION_NOT_FOUND` if no such registration exists.
pub async fn get_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<RegistrationResponse>, AppError> {
    state
        .ledger
        .registration(RegistrationId::from_uuid(registration_id))
        .await?
        .map(|registration| Json(registration.into()))
        .ok_or_else(|| {
            AppError::not_found(
                "REGISTRATION_NOT_FOUND",
                format!("Registration {registration_id} not found"),
            )
        })
}
