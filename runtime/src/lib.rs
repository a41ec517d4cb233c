//! # Checkin Runtime
//!
//! Services over the storage seams of `checkin-core`.
//!
//! ## Core Components
//!
//! - **[`RegistrationLedger`]**: capacity-aware registration with one active
//!   registration per identity and event
//! - **[`CheckInProcessor`]**: exactly-once `registered → checked_in` transition
//! - **[`AnalyticsAggregator`]**: funnel counts, breakdowns and check-in velocity,
//!   recomputed from the ledger on every call
//! - **[`InviteCodes`]**: short public lookup codes for events
//!
//! Every service holds a [`CheckinEnvironment`] and no state of its own, so
//! any number of request handlers may share them.
//!
//! ## Example
//!
//! ```ignore
//! use checkin_runtime::{CheckInProcessor, CheckinEnvironment, RegistrationLedger};
//!
//! let env = CheckinEnvironment::from_store(store);
//! let ledger = RegistrationLedger::new(env.clone());
//! let checkins = CheckInProcessor::new(env);
//!
//! let registration = ledger.register(event_id, identity_id).await?;
//! let receipt = checkins.check_in(&registration.credential, event_id).await?;
//! println!("Welcome, {}", receipt.attendee_name);
//! ```

/// Check-in funnel and velocity analytics
pub mod analytics;

/// Scanned-credential processing
pub mod checkin;

/// Injected collaborators
pub mod environment;

/// Invite-code issuance and lookup
pub mod invite;

/// Capacity-aware registration
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

pub use analytics::{
    AggregateSnapshot, AnalyticsAggregator, AnalyticsConfig, BreakdownEntry, VelocityBucket,
};
pub use checkin::{CheckInProcessor, CheckInReceipt};
pub use environment::CheckinEnvironment;
pub use invite::InviteCodes;
pub use ledger::RegistrationLedger;
