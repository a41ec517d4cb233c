//! Error types for HTTP handlers.
//!
//! [`AppError`] bridges the service error enums and HTTP responses. Business
//! outcomes become 4xx responses with a stable `code`; infrastructure failures
//! become 5xx responses and are logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use checkin_core::error::{
    AnalyticsError, CheckInError, InviteCodeError, RegistrationError, StoreError,
};
use serde::Serialize;
use std::fmt;

/// Application error type for HTTP handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Data>, AppError> {
///     let counts = ledger.count_active(event_id).await?;
///     Ok(Json(counts.into()))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Structured context for the client, e.g. who already checked in
    details: Option<serde_json::Value>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            details: None,
            source: None,
        }
    }

    /// Attach an internal source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach structured details to the response body.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// HTTP status this error renders as
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message.into(), code.to_string())
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), code.to_string())
    }

    /// Create a 410 Gone error.
    #[must_use]
    pub fn gone(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::GONE, message.into(), code.to_string())
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(code: &str, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            code.to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

/// Storage failures share one rendering across every service.
fn storage_conflict(message: String) -> AppError {
    AppError::conflict("STORAGE_CONFLICT", "The request conflicted with a concurrent update; retry it")
        .with_source(anyhow::anyhow!(message))
}

fn storage_unavailable(message: String) -> AppError {
    AppError::unavailable("STORAGE_UNAVAILABLE", "Storage is unavailable")
        .with_source(anyhow::anyhow!(message))
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => storage_conflict(msg),
            StoreError::Unavailable(msg) => storage_unavailable(msg),
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        let message = err.to_string();
        match err {
            RegistrationError::EventNotFound(_) => Self::not_found("EVENT_NOT_FOUND", message),
            RegistrationError::EventFull { .. } => Self::conflict("EVENT_FULL", message),
            RegistrationError::AlreadyRegistered { existing } => {
                Self::conflict("ALREADY_REGISTERED", message)
                    .with_details(serde_json::json!({ "registration_id": existing }))
            }
            RegistrationError::StorageConflict(msg) => storage_conflict(msg),
            RegistrationError::StorageUnavailable(msg) => storage_unavailable(msg),
            RegistrationError::CredentialIssuance(msg) => {
                Self::internal("Could not issue a credential").with_source(anyhow::anyhow!(msg))
            }
        }
    }
}

impl From<CheckInError> for AppError {
    fn from(err: CheckInError) -> Self {
        let message = err.to_string();
        match err {
            CheckInError::CredentialNotFound => Self::not_found("CREDENTIAL_NOT_FOUND", message),
            CheckInError::AlreadyCheckedIn {
                attendee_name,
                checked_in_at,
            } => Self::conflict("ALREADY_CHECKED_IN", message).with_details(serde_json::json!({
                "attendee_name": attendee_name,
                "checked_in_at": checked_in_at,
            })),
            CheckInError::RegistrationCancelled => Self::gone("REGISTRATION_CANCELLED", message),
            CheckInError::StorageConflict(msg) => storage_conflict(msg),
            CheckInError::StorageUnavailable(msg) => storage_unavailable(msg),
        }
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        let message = err.to_string();
        match err {
            AnalyticsError::EventNotFound(_) => Self::not_found("EVENT_NOT_FOUND", message),
            AnalyticsError::StorageConflict(msg) => storage_conflict(msg),
            AnalyticsError::StorageUnavailable(msg) => storage_unavailable(msg),
        }
    }
}

impl From<InviteCodeError> for AppError {
    fn from(err: InviteCodeError) -> Self {
        let message = err.to_string();
        match err {
            InviteCodeError::EventNotFound(_) => Self::not_found("EVENT_NOT_FOUND", message),
            InviteCodeError::Exhausted { .. } => {
                Self::unavailable("INVITE_CODES_EXHAUSTED", message)
            }
            InviteCodeError::Storage(store) => store.into(),
        }
    }
}
