//! Prometheus metrics for registration, check-in and analytics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `checkin_registrations_total{outcome}` - registrations by outcome
//!   (`registered`, `already_registered`, `event_full`, `event_not_found`, `error`)
//! - `checkin_check_ins_total{outcome}` - scans by outcome
//!   (`checked_in`, `already_checked_in`, `not_found`, `cancelled`, `error`)
//! - `checkin_summaries_total` - analytics snapshots computed
//! - `checkin_invite_codes_issued_total` - invite codes bound to events
//! - `checkin_retry_attempts_total`, `checkin_retry_successes_total`,
//!   `checkin_retry_exhausted_total` - storage-conflict retries
//! - `checkin_storage_conflicts_total` - serialization failures reported by storage
//!
//! ## Histograms
//! - `checkin_summary_duration_seconds` - time to compute a snapshot
//!
//! # Example
//!
//! ```rust,no_run
//! use checkin_runtime::metrics::MetricsExporter;
//!
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//! let text = exporter.render();
//! # Ok::<(), checkin_runtime::metrics::MetricsError>(())
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the handle used to render the scrape body.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed (e.g. by another test) is not an error.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the recorder was not installed by this exporter.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "checkin_registrations_total",
        "Registration attempts by outcome"
    );
    describe_counter!("checkin_check_ins_total", "Check-in scans by outcome");
    describe_counter!(
        "checkin_summaries_total",
        "Analytics snapshots computed on demand"
    );
    describe_histogram!(
        "checkin_summary_duration_seconds",
        "Time taken to compute an analytics snapshot"
    );
    describe_counter!(
        "checkin_invite_codes_issued_total",
        "Invite codes bound to events"
    );
    describe_counter!(
        "checkin_retry_attempts_total",
        "Storage conflicts that triggered a retry"
    );
    describe_counter!(
        "checkin_retry_successes_total",
        "Operations that succeeded after a retry"
    );
    describe_counter!(
        "checkin_retry_exhausted_total",
        "Operations still conflicting after the last retry"
    );
    describe_counter!(
        "checkin_storage_conflicts_total",
        "Serialization failures and constraint races reported by storage"
    );
}

/// Record the outcome of one `register` call.
pub fn record_registration(outcome: &'static str) {
    counter!("checkin_registrations_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of one `check_in` call.
pub fn record_check_in(outcome: &'static str) {
    counter!("checkin_check_ins_total", "outcome" => outcome).increment(1);
}

/// Record one analytics snapshot.
pub fn record_summary(duration: Duration) {
    counter!("checkin_summaries_total").increment(1);
    histogram!("checkin_summary_duration_seconds").record(duration.as_secs_f64());
}

/// Record one invite code issued.
pub fn record_invite_code_issued() {
    counter!("checkin_invite_codes_issued_total").increment(1);
}
