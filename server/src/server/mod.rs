//! HTTP server wiring: shared state, routes and health probes.

pub mod health;
pub mod routes;
pub mod state;

pub use health::HealthProbe;
pub use routes::{build_router, metrics_router};
pub use state::AppState;
