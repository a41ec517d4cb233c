//! Read-side analytics for one event.
//!
//! A snapshot is recomputed from the ledger on every call and never cached,
//! so it cannot drift from the registrations it describes. An event that
//! exists but has no registrations produces an all-zero snapshot; callers
//! render "no data yet" as a normal state.
//!
//! The grouping and bucketing rules live in free functions
//! ([`group_counts`], [`job_title_breakdown`], [`bucket_check_ins`]) so they
//! can be exercised without a store.

use crate::environment::CheckinEnvironment;
use crate::metrics;
use checkin_core::error::AnalyticsError;
use checkin_core::types::{Capacity, EventId, IdentityId, RegistrationStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// Label for registrations whose grouping field is missing or blank.
pub const UNSPECIFIED: &str = "Unspecified";

/// Label for the collapsed tail when `collapse_remainder` is on.
pub const OTHER: &str = "Other";

/// Knobs for [`AnalyticsAggregator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalyticsConfig {
    /// Width of one check-in velocity window
    pub bucket_width: Duration,
    /// Groups kept in each breakdown
    pub breakdown_limit: usize,
    /// Fold groups past the limit into a single "Other" entry instead of dropping them
    pub collapse_remainder: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bucket_width: Duration::minutes(30),
            breakdown_limit: 8,
            collapse_remainder: false,
        }
    }
}

/// One group in a breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BreakdownEntry {
    /// Group label
    pub label: String,
    /// Active registrations in the group
    pub count: u64,
}

/// One window of the check-in velocity series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VelocityBucket {
    /// Inclusive start of the window
    pub starts_at: DateTime<Utc>,
    /// Check-ins recorded in the window
    pub count: u64,
}

/// Derived statistics for one event. Not persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    /// The event summarized
    pub event_id: EventId,
    /// Its ceiling
    pub capacity: Capacity,
    /// Registrations in `registered` or `checked_in`
    pub total_registered: u64,
    /// Registrations in `checked_in`
    pub total_checked_in: u64,
    /// `total_registered / capacity`; absent for unbounded events
    pub fill_rate: Option<f64>,
    /// `total_checked_in / total_registered`, 0 when nobody registered
    pub show_up_rate: f64,
    /// Active registrations grouped by job title
    pub job_title_breakdown: Vec<BreakdownEntry>,
    /// Active registrations grouped by company
    pub company_breakdown: Vec<BreakdownEntry>,
    /// Zero-filled check-in counts per window
    pub check_in_velocity: Vec<VelocityBucket>,
    /// When the snapshot was computed
    pub generated_at: DateTime<Utc>,
}

/// Computes [`AggregateSnapshot`]s.
#[derive(Clone)]
pub struct AnalyticsAggregator {
    env: CheckinEnvironment,
    config: AnalyticsConfig,
}

impl AnalyticsAggregator {
    /// Create an aggregator with the default configuration.
    #[must_use]
    pub fn new(env: CheckinEnvironment) -> Self {
        Self::with_config(env, AnalyticsConfig::default())
    }

    /// Create an aggregator with an explicit configuration.
    #[must_use]
    pub const fn with_config(env: CheckinEnvironment, config: AnalyticsConfig) -> Self {
        Self { env, config }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Summarize the current ledger state of `event_id`.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: no such event
    /// - `StorageConflict` / `StorageUnavailable`: storage failed
    #[tracing::instrument(skip_all, fields(%event_id))]
    pub async fn summarize(&self, event_id: EventId) -> Result<AggregateSnapshot, AnalyticsError> {
        let started = Instant::now();

        let (event, registrations) = futures::try_join!(
            self.env.events.get_event(event_id),
            self.env.registrations.active_registrations(event_id)
        )?;
        let Some(event) = event else {
            tracing::debug!("Summary requested for unknown event");
            return Err(AnalyticsError::EventNotFound(event_id));
        };

        let identity_ids: Vec<IdentityId> = registrations.iter().map(|r| r.identity_id).collect();
        let projections = if identity_ids.is_empty() {
            HashMap::new()
        } else {
            self.env.identities.identity_projections(&identity_ids).await?
        };

        let total_registered = registrations.len() as u64;
        let check_in_times: Vec<DateTime<Utc>> = registrations
            .iter()
            .filter(|r| r.status == RegistrationStatus::CheckedIn)
            .filter_map(|r| r.checked_in_at)
            .collect();
        let total_checked_in = registrations
            .iter()
            .filter(|r| r.status == RegistrationStatus::CheckedIn)
            .count() as u64;

        let job_titles = registrations.iter().map(|r| {
            projections
                .get(&r.identity_id)
                .and_then(|p| p.job_title.as_deref())
        });
        let companies = registrations.iter().map(|r| {
            projections
                .get(&r.identity_id)
                .and_then(|p| p.company.as_deref())
        });

        let snapshot = AggregateSnapshot {
            event_id,
            capacity: event.capacity,
            total_registered,
            total_checked_in,
            fill_rate: fill_rate(total_registered, event.capacity),
            show_up_rate: ratio(total_checked_in, total_registered),
            job_title_breakdown: job_title_breakdown(job_titles, &self.config),
            company_breakdown: group_counts(
                companies,
                self.config.breakdown_limit,
                self.config.collapse_remainder,
            ),
            check_in_velocity: bucket_check_ins(&check_in_times, self.config.bucket_width),
            generated_at: self.env.clock.now(),
        };

        metrics::record_summary(started.elapsed());
        tracing::debug!(
            total_registered,
            total_checked_in,
            buckets = snapshot.check_in_velocity.len(),
            "Summary computed"
        );

        Ok(snapshot)
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[allow(clippy::cast_precision_loss)]
fn fill_rate(registered: u64, capacity: Capacity) -> Option<f64> {
    capacity
        .seats()
        .map(|seats| registered as f64 / f64::from(seats))
}

/// Group registrations by job title with the configured limit.
pub fn job_title_breakdown<'a, I>(titles: I, config: &AnalyticsConfig) -> Vec<BreakdownEntry>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    group_counts(titles, config.breakdown_limit, config.collapse_remainder)
}

/// Count values per label.
///
/// Labels are trimmed; missing or blank values count as [`UNSPECIFIED`].
/// Entries are ordered by count (descending), ties by label (ascending), and
/// only the first `limit` are kept. With `collapse_remainder` the dropped
/// tail is summed into one trailing [`OTHER`] entry.
pub fn group_counts<'a, I>(values: I, limit: usize, collapse_remainder: bool) -> Vec<BreakdownEntry>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for value in values {
        let label = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(UNSPECIFIED);
        *counts.entry(label).or_default() += 1;
    }

    let mut entries: Vec<BreakdownEntry> = counts
        .into_iter()
        .map(|(label, count)| BreakdownEntry {
            label: label.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    if entries.len() > limit {
        let remainder: u64 = entries.drain(limit..).map(|e| e.count).sum();
        if collapse_remainder {
            entries.push(BreakdownEntry {
                label: OTHER.to_string(),
                count: remainder,
            });
        }
    }

    entries
}

/// Bucket check-in times into fixed windows aligned to the Unix epoch.
///
/// The series runs from the window holding the earliest check-in to the
/// window holding the latest, both inclusive, with empty windows reported as
/// zero. No check-ins gives an empty series. Widths under one second are
/// treated as one second.
#[must_use]
pub fn bucket_check_ins(times: &[DateTime<Utc>], width: Duration) -> Vec<VelocityBucket> {
    let width_secs = width.num_seconds().max(1);
    let width = Duration::seconds(width_secs);

    let (Some(first), Some(last)) = (
        times.iter().map(|t| window_start(*t, width_secs)).min(),
        times.iter().map(|t| window_start(*t, width_secs)).max(),
    ) else {
        return Vec::new();
    };

    let mut buckets = Vec::new();
    let mut starts_at = first;
    while starts_at <= last {
        buckets.push(VelocityBucket { starts_at, count: 0 });
        starts_at += width;
    }

    for t in times {
        let offset = (window_start(*t, width_secs) - first).num_seconds() / width_secs;
        if let Some(bucket) = usize::try_from(offset).ok().and_then(|i| buckets.get_mut(i)) {
            bucket.count += 1;
        }
    }

    buckets
}

fn window_start(at: DateTime<Utc>, width_secs: i64) -> DateTime<Utc> {
    let into_window = at.timestamp().rem_euclid(width_secs);
    at - Duration::seconds(into_window)
        - Duration::nanoseconds(i64::from(at.timestamp_subsec_nanos()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::checkin::CheckInProcessor;
    use crate::ledger::RegistrationLedger;
    use checkin_testing::fixtures::{profile, profile_at};
    use checkin_testing::properties::{check_in_minutes, job_title};
    use checkin_testing::{InMemoryStore, ManualClock, epoch};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn minutes(offsets: &[i64]) -> Vec<DateTime<Utc>> {
        offsets.iter().map(|m| epoch() + Duration::minutes(*m)).collect()
    }

    #[test]
    fn velocity_zero_fills_gaps() {
        let series = bucket_check_ins(&minutes(&[0, 90]), Duration::minutes(30));

        let counts: Vec<u64> = series.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 0, 0, 1]);
        assert_eq!(series[0].starts_at, epoch());
        assert_eq!(series[3].starts_at, epoch() + Duration::minutes(90));
    }

    #[test]
    fn velocity_without_check_ins_is_empty() {
        assert!(bucket_check_ins(&[], Duration::minutes(30)).is_empty());
    }

    #[test]
    fn velocity_windows_are_aligned() {
        let series = bucket_check_ins(&minutes(&[7, 29, 31]), Duration::minutes(30));

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].starts_at, epoch());
        assert_eq!(series[0].count, 2);
        assert_eq!(series[1].starts_at, epoch() + Duration::minutes(30));
        assert_eq!(series[1].count, 1);
    }

    #[test]
    fn velocity_accepts_unsorted_input() {
        let series = bucket_check_ins(&minutes(&[61, 0, 15]), Duration::minutes(30));
        let counts: Vec<u64> = series.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 0, 1]);
    }

    #[test]
    fn breakdown_keeps_top_eight_without_other() {
        let mut titles = Vec::new();
        for (i, title) in ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"].iter().enumerate() {
            for _ in 0..(10 - i) {
                titles.push(Some(*title));
            }
        }

        let breakdown = job_title_breakdown(titles, &AnalyticsConfig::default());
        let labels: Vec<&str> = breakdown.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D", "E", "F", "G", "H"]);
        assert!(breakdown.iter().all(|e| e.label != OTHER));
    }

    #[test]
    fn breakdown_can_collapse_remainder() {
        let titles = ["A", "A", "B", "C", "D"].map(Some);
        let breakdown = group_counts(titles, 2, true);

        assert_eq!(
            breakdown,
            vec![
                BreakdownEntry { label: "A".into(), count: 2 },
                BreakdownEntry { label: "B".into(), count: 1 },
                BreakdownEntry { label: OTHER.into(), count: 2 },
            ]
        );
    }

    #[test]
    fn missing_and_blank_titles_are_unspecified() {
        let breakdown = group_counts([None, Some(""), Some("  "), Some(" CTO ")], 8, false);
        assert_eq!(
            breakdown,
            vec![
                BreakdownEntry { label: UNSPECIFIED.into(), count: 3 },
                BreakdownEntry { label: "CTO".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn ties_are_ordered_by_label() {
        let breakdown = group_counts([Some("Zed"), Some("Amy"), Some("Kim")], 8, false);
        let labels: Vec<&str> = breakdown.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Amy", "Kim", "Zed"]);
    }

    #[test]
    fn rates() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(1, 2), 0.5);
        assert_eq!(fill_rate(2, Capacity::Limited(2)), Some(1.0));
        assert_eq!(fill_rate(5, Capacity::Unbounded), None);
    }

    fn services(
        store: &Arc<InMemoryStore>,
        clock: &ManualClock,
    ) -> (RegistrationLedger, CheckInProcessor, AnalyticsAggregator) {
        let env = CheckinEnvironment::from_store(store.clone()).with_clock(Arc::new(clock.clone()));
        (
            RegistrationLedger::new(env.clone()),
            CheckInProcessor::new(env.clone()),
            AnalyticsAggregator::new(env),
        )
    }

    #[tokio::test]
    async fn empty_event_summarizes_to_zero() {
        let store = Arc::new(InMemoryStore::new());
        let clock = ManualClock::new(epoch());
        let (_, _, analytics) = services(&store, &clock);
        let event_id = store.create_event(Capacity::Limited(50));

        let snapshot = analytics.summarize(event_id).await.unwrap();
        assert_eq!(snapshot.total_registered, 0);
        assert_eq!(snapshot.total_checked_in, 0);
        assert_eq!(snapshot.fill_rate, Some(0.0));
        assert_eq!(snapshot.show_up_rate, 0.0);
        assert!(snapshot.job_title_breakdown.is_empty());
        assert!(snapshot.company_breakdown.is_empty());
        assert!(snapshot.check_in_velocity.is_empty());
    }

    #[tokio::test]
    async fn unknown_event_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        let clock = ManualClock::new(epoch());
        let (_, _, analytics) = services(&store, &clock);
        let missing = EventId::new();

        let err = analytics.summarize(missing).await.unwrap_err();
        assert_eq!(err, AnalyticsError::EventNotFound(missing));
    }

    #[tokio::test]
    async fn summary_reflects_ledger() {
        let store = Arc::new(InMemoryStore::new());
        let clock = ManualClock::new(epoch());
        let (ledger, checkins, analytics) = services(&store, &clock);
        let event_id = store.create_event(Capacity::Unbounded);

        let ada = ledger
            .register_profile(event_id, &profile_at("Ada", Some("Engineer"), "Acme"))
            .await
            .unwrap();
        let bob = ledger
            .register_profile(event_id, &profile_at("Bob", Some("Engineer"), "Acme"))
            .await
            .unwrap();
        ledger
            .register_profile(event_id, &profile("Cy", None))
            .await
            .unwrap();
        let gone = ledger
            .register_profile(event_id, &profile("Dee", Some("Founder")))
            .await
            .unwrap();
        store.cancel_registration(gone.id);

        clock.advance(Duration::minutes(10));
        checkins.check_in(&ada.credential, event_id).await.unwrap();
        clock.advance(Duration::minutes(65));
        checkins.check_in(&bob.credential, event_id).await.unwrap();

        let snapshot = analytics.summarize(event_id).await.unwrap();
        assert_eq!(snapshot.total_registered, 3);
        assert_eq!(snapshot.total_checked_in, 2);
        assert_eq!(snapshot.fill_rate, None);
        assert!((snapshot.show_up_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(
            snapshot.job_title_breakdown,
            vec![
                BreakdownEntry { label: "Engineer".into(), count: 2 },
                BreakdownEntry { label: UNSPECIFIED.into(), count: 1 },
            ]
        );
        assert_eq!(
            snapshot.company_breakdown,
            vec![
                BreakdownEntry { label: "Acme".into(), count: 2 },
                BreakdownEntry { label: UNSPECIFIED.into(), count: 1 },
            ]
        );
        let counts: Vec<u64> = snapshot.check_in_velocity.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 0, 1]);
        assert_eq!(snapshot.generated_at, epoch() + Duration::minutes(75));
    }

    #[tokio::test]
    async fn snapshot_serializes_rates_and_series() {
        let store = Arc::new(InMemoryStore::new());
        let clock = ManualClock::new(epoch());
        let (_, _, analytics) = services(&store, &clock);
        let event_id = store.create_event(Capacity::Unbounded);

        let json = serde_json::to_value(analytics.summarize(event_id).await.unwrap()).unwrap();
        assert!(json["fill_rate"].is_null());
        assert_eq!(json["show_up_rate"], 0.0);
        assert_eq!(json["capacity"]["kind"], "unbounded");
        assert!(json["check_in_velocity"].as_array().unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn velocity_accounts_for_every_check_in(offsets in check_in_minutes(64), width in 1i64..120) {
            let times = minutes(&offsets);
            let series = bucket_check_ins(&times, Duration::minutes(width));

            let total: u64 = series.iter().map(|b| b.count).sum();
            prop_assert_eq!(total, times.len() as u64);

            if let (Some(first), Some(last)) = (series.first(), series.last()) {
                prop_assert!(first.count > 0);
                prop_assert!(last.count > 0);
            }
            for pair in series.windows(2) {
                prop_assert_eq!(pair[1].starts_at - pair[0].starts_at, Duration::minutes(width));
            }
        }

        #[test]
        fn breakdown_is_bounded_and_sorted(
            titles in prop::collection::vec(job_title(), 0..100),
            limit in 0usize..12,
            collapse in any::<bool>(),
        ) {
            let breakdown = group_counts(titles.iter().map(Option::as_deref), limit, collapse);

            let kept = if collapse { limit + 1 } else { limit };
            prop_assert!(breakdown.len() <= kept);

            let ranked = if collapse && breakdown.len() > limit {
                &breakdown[..breakdown.len() - 1]
            } else {
                &breakdown[..]
            };
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].count >= pair[1].count);
            }

            let total: u64 = breakdown.iter().map(|e| e.count).sum();
            if collapse {
                prop_assert_eq!(total, titles.len() as u64);
            } else {
                prop_assert!(total <= titles.len() as u64);
            }
        }
    }
}
