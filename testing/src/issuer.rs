//! Scripted credential issuer for exercising collision handling.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use checkin_core::credentials::{self, CredentialError, CredentialIssuer};
use checkin_core::types::{Credential, InviteCode};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Hands out pre-scripted credentials and invite codes in order, then falls
/// back to real random ones once the script runs out.
///
/// # Example
///
/// ```
/// use checkin_testing::ScriptedIssuer;
/// use checkin_core::credentials::{CREDENTIAL_LEN, CredentialIssuer};
///
/// let issuer = ScriptedIssuer::new(["first", "second"]);
/// assert_eq!(issuer.issue_credential().unwrap().as_str(), "first");
/// assert_eq!(issuer.issue_credential().unwrap().as_str(), "second");
/// assert_eq!(issuer.issue_credential().unwrap().as_str().len(), CREDENTIAL_LEN);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedIssuer {
    credentials: Mutex<VecDeque<Credential>>,
    invite_codes: Mutex<VecDeque<InviteCode>>,
    entropy_failure: bool,
}

impl ScriptedIssuer {
    /// Script the credentials to hand out first
    #[must_use]
    pub fn new<I, S>(credentials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            credentials: Mutex::new(credentials.into_iter().map(Credential::new).collect()),
            ..Self::default()
        }
    }

    /// Script the invite codes to hand out first. Invalid codes are skipped.
    #[must_use]
    pub fn with_invite_codes<'a>(self, codes: impl IntoIterator<Item = &'a str>) -> Self {
        let codes = codes
            .into_iter()
            .filter_map(|c| InviteCode::parse(c).ok())
            .collect();
        Self {
            invite_codes: Mutex::new(codes),
            ..self
        }
    }

    /// An issuer whose entropy source is broken
    #[must_use]
    pub fn broken() -> Self {
        Self {
            entropy_failure: true,
            ..Self::default()
        }
    }
}

impl CredentialIssuer for ScriptedIssuer {
    fn issue_credential(&self) -> Result<Credential, CredentialError> {
        if self.entropy_failure {
            return Err(CredentialError::EntropyUnavailable(
                "scripted entropy failure".to_string(),
            ));
        }
        match self.credentials.lock().unwrap().pop_front() {
            Some(credential) => Ok(credential),
            None => credentials::issue_credential(),
        }
    }

    fn issue_invite_code(&self) -> InviteCode {
        self.invite_codes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(credentials::issue_invite_code)
    }
}
