//! HTTP surface for event registration, door check-in and attendance analytics.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler in [`api`]
//! 2. **Extract and validate** path and JSON body
//! 3. **Call a service** from [`AppState`] (ledger, check-in, analytics, invites)
//! 4. **Map the result**: business outcomes become 4xx via [`AppError`],
//!    storage failures become 5xx and are logged
//!
//! # Example
//!
//! ```ignore
//! use checkin_server::{AppState, Config, build_router};
//!
//! let config = Config::from_env();
//! let state = AppState::new(env, config.analytics_config(), probe);
//! let app = build_router(state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::Config;
pub use error::AppError;
pub use server::{AppState, HealthProbe, build_router};
