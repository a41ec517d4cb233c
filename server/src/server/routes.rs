//! Router configuration for the check-in server.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{analytics, check_ins, invite_codes, registrations};
use axum::{
    Router,
    routing::{get, post},
};
use checkin_runtime::metrics::MetricsExporter;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `GET /health`, `GET /ready`
/// - `POST /api/events/:event_id/registrations`
/// - `GET /api/events/:event_id/counts`
/// - `GET /api/registrations/:registration_id`
/// - `POST /api/events/:event_id/check-ins`
/// - `GET /api/events/:event_id/summary`
/// - `POST /api/events/:event_id/invite-code`
/// - `GET /api/invite-codes/:code`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/events/:event_id/registrations",
            post(registrations::register),
        )
        .route("/events/:event_id/counts", get(registrations::counts))
        .route(
            "/registrations/:registration_id",
            get(registrations::get_registration),
        )
        .route("/events/:event_id/check-ins", post(check_ins::check_in))
        .route("/events/:event_id/summary", get(analytics::summary))
        .route("/events/:event_id/invite-code", post(invite_codes::issue))
        .route("/invite-codes/:code", get(invite_codes::resolve));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for the Prometheus scrape endpoint, served on its own listener.
pub fn metrics_router(exporter: Arc<MetricsExporter>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let exporter = exporter.clone();
            async move { exporter.render().unwrap_or_default() }
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint_answers_before_install() {
        let app = metrics_router(Arc::new(MetricsExporter::new()));
        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_router_serves_nothing_else() {
        let app = metrics_router(Arc::new(MetricsExporter::new()));
        let response = app.oneshot(get_request("/api/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
