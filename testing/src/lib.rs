//! # Checkin Testing
//!
//! Testing utilities for the check-in core.
//!
//! This crate provides:
//! - [`InMemoryStore`]: every storage trait over in-memory tables
//! - [`ScriptedIssuer`]: deterministic credentials for collision tests
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - Profile fixtures and proptest strategies
//!
//! ## Example
//!
//! ```ignore
//! use checkin_testing::{InMemoryStore, test_clock};
//!
//! #[tokio::test]
//! async fn test_register() {
//!     let store = Arc::new(InMemoryStore::new());
//!     let event_id = store.create_event(Capacity::Limited(2));
//!     let env = CheckinEnvironment::from_store(store.clone()).with_clock(Arc::new(test_clock()));
//!     let ledger = RegistrationLedger::new(env);
//!
//!     let registration = ledger.register_profile(event_id, &profile("Ada", None)).await?;
//!     assert_eq!(registration.status, RegistrationStatus::Registered);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use checkin_core::environment::Clock;

pub mod issuer;
pub mod store;

pub use issuer::ScriptedIssuer;
pub use store::InMemoryStore;

/// Mock clocks for deterministic tests.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use checkin_testing::mocks::FixedClock;
    /// use checkin_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep a handle and advance
    /// the clock a service is holding.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start the clock at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }

        /// Jump to an absolute time
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap() = to;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// The instant every test clock starts at (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }
}

/// Profile fixtures.
pub mod fixtures {
    use checkin_core::types::IdentityProfile;

    /// A profile whose email is derived from `name`, so distinct names give
    /// distinct identities.
    #[must_use]
    pub fn profile(name: &str, job_title: Option<&str>) -> IdentityProfile {
        IdentityProfile {
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            name: name.to_string(),
            company: None,
            job_title: job_title.map(str::to_string),
        }
    }

    /// Same as [`profile`], with a company.
    #[must_use]
    pub fn profile_at(name: &str, job_title: Option<&str>, company: &str) -> IdentityProfile {
        IdentityProfile {
            company: Some(company.to_string()),
            ..profile(name, job_title)
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Job titles drawn from a small pool so groups collide, with `None`
    /// and blank strings mixed in.
    pub fn job_title() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            prop::sample::select(vec![
                "Engineer", "Designer", "Founder", "CTO", "Student", "Recruiter", "Analyst",
                "Manager", "Researcher", "Writer", "Investor",
            ])
            .prop_map(|t| Some(t.to_string())),
        ]
    }

    /// Minute offsets for check-in times within a working day.
    pub fn check_in_minutes(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(0i64..600, 0..max_len)
    }
}

/// Install a `tracing` subscriber for test output. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, epoch, test_clock};
