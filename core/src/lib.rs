//! # Checkin Core
//!
//! Domain types, error taxonomy and storage traits for capacity-bounded event
//! registration, credential-based check-in and attendance analytics.
//!
//! ## Core Concepts
//!
//! - **Registration**: one attendee's seat at one event, carrying a unique
//!   check-in [`Credential`](types::Credential)
//! - **Active registration**: `registered` or `checked_in`; counts against capacity
//! - **Store**: the registration table, the only shared mutable state
//! - **Directories**: event metadata and attendee identities, owned elsewhere
//!
//! ## Architecture Principles
//!
//! - Stateless services, storage-enforced invariants
//! - Atomic conditional writes instead of check-then-act
//! - Business outcomes and infrastructure failures never share an error variant
//! - Dependencies injected as trait objects

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod error;
pub mod store;
pub mod types;

pub use error::{AnalyticsError, CheckInError, InviteCodeError, RegistrationError, StoreError};
pub use store::{
    CheckInOutcome, EventDirectory, IdentityDirectory, InsertOutcome, InviteCodeAssignment,
    RegistrationStore, StoreFuture,
};

/// Environment module - Dependency injection traits
///
/// All ambient dependencies are abstracted behind traits so tests can
/// substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use checkin_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
