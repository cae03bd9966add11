//! Login methods, password recovery steps and one-time codes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{CodePurpose, Identifier, UserId};

/// Digits in a verification code.
pub const CODE_LENGTH: usize = 6;

/// Minutes a verification code stays valid.
pub const CODE_TTL_MINUTES: i64 = 5;

/// Wrong guesses allowed before a code is burned.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

/// How a user signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    EmailPassword,
    PhonePassword,
    PhoneCode,
}

impl LoginMethod {
    /// Password login method for an identifier.
    #[must_use]
    pub const fn password_for(identifier: &Identifier) -> Self {
        match identifier {
            Identifier::Email(_) => Self::EmailPassword,
            Identifier::Phone(_) => Self::PhonePassword,
        }
    }
}

/// Errors from multi-step flows.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("this step is out of order; start again")]
    OutOfOrder,
    #[error("code must be {CODE_LENGTH} digits")]
    CodeFormat,
    #[error("no code was requested or it was already used")]
    CodeMissing,
    #[error("code has expired")]
    CodeExpired,
    #[error("too many attempts; request a new code")]
    TooManyAttempts,
    #[error("code is incorrect")]
    CodeMismatch,
}

/// Progress through password recovery, kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RecoveryStep {
    /// A code was sent to `identifier`.
    Requested { identifier: Identifier },
    /// The code was accepted; the password may now be reset.
    Verified { user_id: UserId },
}

impl RecoveryStep {
    /// Start recovery for an identifier. Restarting is always allowed.
    #[must_use]
    pub const fn request(identifier: Identifier) -> Self {
        Self::Requested { identifier }
    }

    /// Identifier a code is expected for.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::OutOfOrder`] unless recovery was requested.
    pub fn pending_identifier(current: Option<&Self>) -> Result<&Identifier, FlowError> {
        match current {
            Some(Self::Requested { identifier }) => Ok(identifier),
            _ => Err(FlowError::OutOfOrder),
        }
    }

    /// Move from `Requested` to `Verified`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::OutOfOrder`] from any other step.
    pub fn verify(current: Option<&Self>, user_id: UserId) -> Result<Self, FlowError> {
        Self::pending_identifier(current)?;
        Ok(Self::Verified { user_id })
    }

    /// Finish recovery, returning the user whose password may be reset.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::OutOfOrder`] unless the code was verified.
    pub fn reset(current: Option<&Self>) -> Result<UserId, FlowError> {
        match current {
            Some(Self::Verified { user_id }) => Ok(*user_id),
            _ => Err(FlowError::OutOfOrder),
        }
    }
}

/// A stored one-time code. Only the SHA-256 hex digest of the code is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCode {
    pub destination: String,
    pub purpose: CodePurpose,
    pub code_hash: String,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
}

impl StoredCode {
    /// Whether the code may still be tried at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::CodeExpired`] or [`FlowError::TooManyAttempts`].
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), FlowError> {
        if now >= self.expires_at {
            return Err(FlowError::CodeExpired);
        }
        if self.attempts >= MAX_CODE_ATTEMPTS {
            return Err(FlowError::TooManyAttempts);
        }
        Ok(())
    }

    /// Guesses left before the code is burned.
    #[must_use]
    pub const fn attempts_left(&self) -> u32 {
        MAX_CODE_ATTEMPTS.saturating_sub(self.attempts)
    }
}

/// How long a verification code stays valid.
#[must_use]
pub fn code_ttl() -> Duration {
    Duration::minutes(CODE_TTL_MINUTES)
}

/// Check that user input looks like a code before touching the store.
///
/// # Errors
///
/// Returns [`FlowError::CodeFormat`] unless the trimmed input is exactly
/// [`CODE_LENGTH`] ASCII digits.
pub fn parse_code(input: &str) -> Result<&str, FlowError> {
    let code = input.trim();
    if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FlowError::CodeFormat);
    }
    Ok(code)
}
