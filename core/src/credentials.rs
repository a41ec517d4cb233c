//! Credential and invite-code generation.
//!
//! Check-in credentials carry 128 bits read straight from the operating
//! system's CSPRNG and are rendered as 22 characters of unpadded base64url. They are
//! independent of the event and the attendee, so knowing either gives no
//! handle on the token.
//!
//! Invite codes are discovery keys, not secrets: 8 characters from an
//! uppercase alphabet with the look-alike glyphs `0 O 1 I` removed, so they
//! survive being read aloud or typed from a printed flyer.

use crate::types::{Credential, InviteCode};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use thiserror::Error;

/// Bytes of entropy in a check-in credential.
pub const CREDENTIAL_BYTES: usize = 16;

/// Length of an encoded credential.
pub const CREDENTIAL_LEN: usize = 22;

/// Length of generated invite codes.
pub const INVITE_CODE_LEN: usize = 8;

/// Alphabet for invite codes.
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Failure to obtain randomness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The operating system refused to provide random bytes.
    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),
}

/// Source of credentials and invite codes.
///
/// The ledger and the invite-code service hold this as a trait object so
/// tests can script collisions.
pub trait CredentialIssuer: Send + Sync {
    /// A fresh, unguessable check-in credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::EntropyUnavailable`] if no randomness can be obtained.
    fn issue_credential(&self) -> Result<Credential, CredentialError>;

    /// A short, human-typeable invite code.
    fn issue_invite_code(&self) -> InviteCode;
}

/// Production issuer backed by the OS CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIssuer;

impl CredentialIssuer for RandomIssuer {
    fn issue_credential(&self) -> Result<Credential, CredentialError> {
        issue_credential()
    }

    fn issue_invite_code(&self) -> InviteCode {
        issue_invite_code()
    }
}

/// Produce a fresh, unguessable check-in credential.
///
/// # Errors
///
/// Returns [`CredentialError::EntropyUnavailable`] if the OS random source
/// fails. This is fatal to the calling request.
pub fn issue_credential() -> Result<Credential, CredentialError> {
    let mut bytes = [0u8; CREDENTIAL_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CredentialError::EntropyUnavailable(e.to_string()))?;

    Ok(Credential::new(URL_SAFE_NO_PAD.encode(bytes)))
}

/// Produce a short, human-typeable invite code.
///
/// Uniqueness is enforced by the event directory, which rejects a taken code
/// so the caller can draw another one.
#[must_use]
pub fn issue_invite_code() -> InviteCode {
    let mut rng = rand::thread_rng();
    let code: String = (0..INVITE_CODE_LEN)
        .map(|_| char::from(INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())]))
        .collect();
    InviteCode::from_generated(code)
}
