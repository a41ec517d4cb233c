//! Health check endpoints.
//!
//! `/health` is a liveness check; `/ready` pings storage.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use checkin_core::store::StoreFuture;
use checkin_postgres::PostgresStore;
use serde::Serialize;

/// A dependency the server needs before it can take traffic.
pub trait HealthProbe: Send + Sync {
    /// Succeeds if the dependency answers.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

impl HealthProbe for PostgresStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(PostgresStore::ping(self))
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Liveness endpoint. Returns 200 OK while the process is serving requests.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"ok","version":"0.1.0"}
/// ```
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Database connectivity
    pub database: bool,
}

/// Readiness endpoint. Returns 503 while storage cannot be reached.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = match state.probe.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Readiness probe failed");
            false
        }
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
        }),
    )
}
