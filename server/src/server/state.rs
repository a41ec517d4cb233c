//! Application state for the check-in HTTP server.

use super::health::HealthProbe;
use checkin_runtime::{
    AnalyticsAggregator, AnalyticsConfig, CheckInProcessor, CheckinEnvironment, InviteCodes,
    RegistrationLedger,
};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// The services hold no state of their own, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Capacity-aware registration
    pub ledger: RegistrationLedger,
    /// Scanned-credential processing
    pub checkins: CheckInProcessor,
    /// Funnel and velocity reports
    pub analytics: AnalyticsAggregator,
    /// Invite-code issuance and lookup
    pub invites: InviteCodes,
    /// Dependency check behind `/ready`
    pub probe: Arc<dyn HealthProbe>,
}

impl AppState {
    /// Build every service over one environment.
    #[must_use]
    pub fn new(
        env: CheckinEnvironment,
        analytics: AnalyticsConfig,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            ledger: RegistrationLedger::new(env.clone()),
            checkins: CheckInProcessor::new(env.clone()),
            analytics: AnalyticsAggregator::with_config(env.clone(), analytics),
            invites: InviteCodes::new(env),
            probe,
        }
    }
}
