//! Concurrency tests for last-seat, duplicate-registration and double-scan races.
//!
//! Every test spawns its requests as independent tasks on a multi-threaded
//! runtime, so the calls genuinely interleave at the storage layer. The
//! services hold no locks of their own; whatever serializes them has to come
//! from the store.
//!
//! Run with: `cargo test -p checkin-runtime --test concurrency_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect

use checkin_core::error::{CheckInError, RegistrationError};
use checkin_core::types::{Capacity, RegistrationStatus};
use checkin_runtime::{
    AnalyticsAggregator, CheckInProcessor, CheckinEnvironment, RegistrationLedger,
};
use checkin_testing::fixtures::profile;
use checkin_testing::{InMemoryStore, ManualClock, epoch};
use chrono::Duration;
use std::sync::Arc;

struct Services {
    store: Arc<InMemoryStore>,
    clock: ManualClock,
    ledger: RegistrationLedger,
    checkins: CheckInProcessor,
    analytics: AnalyticsAggregator,
}

fn services() -> Services {
    checkin_testing::init_test_tracing();
    let store = Arc::new(InMemoryStore::new());
    let clock = ManualClock::new(epoch());
    let env = CheckinEnvironment::from_store(store.clone()).with_clock(Arc::new(clock.clone()));
    Services {
        store,
        clock,
        ledger: RegistrationLedger::new(env.clone()),
        checkins: CheckInProcessor::new(env.clone()),
        analytics: AnalyticsAggregator::new(env),
    }
}

/// N > C concurrent registrations from distinct identities against capacity C:
/// exactly C succeed and N - C are told the event is full.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn last_seat_race_never_overbooks() {
    const CAPACITY: u32 = 10;
    const ATTEMPTS: usize = 100;

    let s = services();
    let event_id = s.store.create_event(Capacity::Limited(CAPACITY));

    let mut handles = Vec::with_capacity(ATTEMPTS);
    for i in 0..ATTEMPTS {
        let ledger = s.ledger.clone();
        let attendee = profile(&format!("Attendee {i}"), None);
        handles.push(tokio::spawn(async move {
            ledger.register_profile(event_id, &attendee).await
        }));
    }

    let mut succeeded = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(RegistrationError::EventFull { .. }) => full += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    println!("  ✅ {succeeded} registered, {full} rejected as full");
    assert_eq!(succeeded, CAPACITY as usize);
    assert_eq!(full, ATTEMPTS - CAPACITY as usize);

    let counts = s.ledger.count_active(event_id).await.unwrap();
    assert_eq!(counts.registered, u64::from(CAPACITY));
}

/// N concurrent registrations for the same identity: exactly one succeeds.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn duplicate_registration_race_admits_one() {
    const ATTEMPTS: usize = 50;

    let s = services();
    let event_id = s.store.create_event(Capacity::Unbounded);
    let identity_id = s.store.add_identity(&profile("Ada", None));

    let mut handles = Vec::with_capacity(ATTEMPTS);
    for _ in 0..ATTEMPTS {
        let ledger = s.ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.register(event_id, identity_id).await
        }));
    }

    let mut winners = Vec::new();
    let mut duplicates = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(registration) => winners.push(registration),
            Err(RegistrationError::AlreadyRegistered { existing }) => duplicates.push(existing),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(duplicates.len(), ATTEMPTS - 1);
    assert!(duplicates.iter().all(|id| *id == winners[0].id));
    assert_eq!(s.store.registrations_for(event_id).len(), 1);
}

/// Two scans of the same badge at the same instant: one check-in, one rejection.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_scans_check_in_once() {
    let s = services();
    let event_id = s.store.create_event(Capacity::Unbounded);

    for round in 0..20 {
        let registration = s
            .ledger
            .register_profile(event_id, &profile(&format!("Guest {round}"), None))
            .await
            .unwrap();

        let first = {
            let checkins = s.checkins.clone();
            let credential = registration.credential.clone();
            tokio::spawn(async move { checkins.check_in(&credential, event_id).await })
        };
        let second = {
            let checkins = s.checkins.clone();
            let credential = registration.credential.clone();
            tokio::spawn(async move { checkins.check_in(&credential, event_id).await })
        };

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let successes = outcomes.iter().filter(|o| o.is_ok()).count();
        let repeats = outcomes
            .iter()
            .filter(|o| matches!(o, Err(CheckInError::AlreadyCheckedIn { .. })))
            .count();

        assert_eq!(successes, 1, "round {round}");
        assert_eq!(repeats, 1, "round {round}");
    }

    let counts = s.ledger.count_active(event_id).await.unwrap();
    assert_eq!(counts.checked_in, 20);
}

/// A credential issued for event A is useless at event B.
#[tokio::test]
async fn credential_from_another_event_is_rejected() {
    let s = services();
    let event_a = s.store.create_event(Capacity::Unbounded);
    let event_b = s.store.create_event(Capacity::Unbounded);

    let registration = s
        .ledger
        .register_profile(event_a, &profile("Ada", None))
        .await
        .unwrap();

    let err = s
        .checkins
        .check_in(&registration.credential, event_b)
        .await
        .unwrap_err();
    assert_eq!(err, CheckInError::CredentialNotFound);
}

/// End-to-end walk through a two-seat event.
#[tokio::test]
#[allow(clippy::float_cmp)]
async fn two_seat_event_scenario() {
    let s = services();
    let event_id = s.store.create_event(Capacity::Limited(2));

    let a = s
        .ledger
        .register_profile(event_id, &profile("Ada", Some("Engineer")))
        .await
        .unwrap();
    s.ledger
        .register_profile(event_id, &profile("Bob", Some("Designer")))
        .await
        .unwrap();
    let full = s
        .ledger
        .register_profile(event_id, &profile("Cy", None))
        .await
        .unwrap_err();
    assert!(matches!(full, RegistrationError::EventFull { .. }));

    s.clock.advance(Duration::minutes(12));
    let receipt = s.checkins.check_in(&a.credential, event_id).await.unwrap();
    assert_eq!(receipt.attendee_name, "Ada");
    let first_time = receipt.checked_in_at;

    s.clock.advance(Duration::minutes(3));
    let again = s.checkins.check_in(&a.credential, event_id).await.unwrap_err();
    assert_eq!(
        again,
        CheckInError::AlreadyCheckedIn {
            attendee_name: "Ada".to_string(),
            checked_in_at: first_time,
        }
    );

    let snapshot = s.analytics.summarize(event_id).await.unwrap();
    assert_eq!(snapshot.total_registered, 2);
    assert_eq!(snapshot.total_checked_in, 1);
    assert_eq!(snapshot.fill_rate, Some(1.0));
    assert_eq!(snapshot.show_up_rate, 0.5);
    assert_eq!(snapshot.check_in_velocity.len(), 1);

    let rows = s.store.registrations_for(event_id);
    assert_eq!(
        rows.iter().filter(|r| r.status == RegistrationStatus::CheckedIn).count(),
        1
    );
}

/// A cancellation frees the seat for someone else.
#[tokio::test]
async fn cancellation_frees_a_seat() {
    let s = services();
    let event_id = s.store.create_event(Capacity::Limited(1));

    let first = s
        .ledger
        .register_profile(event_id, &profile("Ada", None))
        .await
        .unwrap();
    assert!(matches!(
        s.ledger.register_profile(event_id, &profile("Bob", None)).await,
        Err(RegistrationError::EventFull { .. })
    ));

    s.store.cancel_registration(first.id);
    assert!(s.ledger.register_profile(event_id, &profile("Bob", None)).await.is_ok());
}
