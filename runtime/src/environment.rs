//! Injected dependencies shared by the ledger, the check-in processor, the
//! analytics aggregator and the invite-code service.

use checkin_core::credentials::{CredentialIssuer, RandomIssuer};
use checkin_core::environment::{Clock, SystemClock};
use checkin_core::store::{EventDirectory, IdentityDirectory, RegistrationStore};
use std::sync::Arc;

/// Everything the services need from the outside world.
///
/// Cloning is cheap: every field is an `Arc`.
#[derive(Clone)]
pub struct CheckinEnvironment {
    /// The registration table
    pub registrations: Arc<dyn RegistrationStore>,
    /// Event metadata collaborator
    pub events: Arc<dyn EventDirectory>,
    /// Profile collaborator
    pub identities: Arc<dyn IdentityDirectory>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Credential and invite-code source
    pub issuer: Arc<dyn CredentialIssuer>,
}

impl CheckinEnvironment {
    /// Build an environment from separate collaborators, using the OS-random issuer.
    #[must_use]
    pub fn new(
        registrations: Arc<dyn RegistrationStore>,
        events: Arc<dyn EventDirectory>,
        identities: Arc<dyn IdentityDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registrations,
            events,
            identities,
            clock,
            issuer: Arc::new(RandomIssuer),
        }
    }

    /// Build an environment from one back-end that implements every storage
    /// trait (the Postgres and in-memory stores both do), with the system clock.
    #[must_use]
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RegistrationStore + EventDirectory + IdentityDirectory + 'static,
    {
        Self::new(store.clone(), store.clone(), store, Arc::new(SystemClock))
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the credential issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Arc<dyn CredentialIssuer>) -> Self {
        self.issuer = issuer;
        self
    }
}
