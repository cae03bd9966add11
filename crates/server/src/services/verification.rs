//! One-time code issuing and checking.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use taiwanese_house_core::flow::{FlowError, MAX_CODE_ATTEMPTS, StoredCode, code_ttl, parse_code};
use taiwanese_house_core::{CodePurpose, Identifier};

use crate::db::{RepositoryError, Store};
use crate::services::notify::{Notifier, NotifyError};

/// Errors from issuing or checking a code.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("delivery failed: {0}")]
    Notify(#[from] NotifyError),
}

/// Issues codes, stores their hashes and checks guesses.
#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl VerificationService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Generate a code, store its hash and send it.
    ///
    /// Replaces any earlier code for the same destination and purpose.
    ///
    /// # Errors
    ///
    /// Returns an error if storing or sending fails.
    #[instrument(skip(self), fields(to = %to.masked()))]
    pub async fn issue(&self, to: &Identifier, purpose: CodePurpose) -> Result<(), VerificationError> {
        let code = generate_code();

        self.store
            .put_code(StoredCode {
                destination: to.as_str().to_owned(),
                purpose,
                code_hash: hash_code(&code),
                attempts: 0,
                expires_at: Utc::now() + code_ttl(),
            })
            .await?;

        self.notifier.send_code(to, purpose, &code).await?;
        Ok(())
    }

    /// Check a guess. A correct code is consumed and cannot be reused.
    ///
    /// Every guess, right or wrong, takes one of [`MAX_CODE_ATTEMPTS`] in a
    /// single store step before the hash is compared, so concurrent guesses
    /// cannot exceed the limit. A wrong last guess burns the code.
    ///
    /// # Errors
    ///
    /// Returns `Flow` errors for a malformed, missing, expired, exhausted or
    /// wrong code.
    #[instrument(skip(self, input), fields(to = %to.masked()))]
    pub async fn verify(
        &self,
        to: &Identifier,
        purpose: CodePurpose,
        input: &str,
    ) -> Result<(), VerificationError> {
        let code = parse_code(input)?;
        let destination = to.as_str();
        let now = Utc::now();

        let Some(stored) = self
            .store
            .claim_attempt(destination, purpose, MAX_CODE_ATTEMPTS, now)
            .await?
        else {
            // Nothing claimed: say why.
            let stored = self
                .store
                .code(destination, purpose)
                .await?
                .ok_or(FlowError::CodeMissing)?;
            stored.check_usable(now)?;
            return Err(FlowError::CodeMissing.into());
        };

        if hash_code(code) != stored.code_hash {
            if stored.attempts >= MAX_CODE_ATTEMPTS {
                self.store
                    .consume_code(destination, purpose, &stored.code_hash)
                    .await?;
                tracing::warn!(purpose = %purpose, "Verification code burned after too many attempts");
                return Err(FlowError::TooManyAttempts.into());
            }
            return Err(FlowError::CodeMismatch.into());
        }

        if !self
            .store
            .consume_code(destination, purpose, &stored.code_hash)
            .await?
        {
            return Err(FlowError::CodeMissing.into());
        }
        Ok(())
    }
}

/// Generate a 6-digit code, zero-padded.
fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{code:06}")
}

/// SHA-256 hex digest of a code.
fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}
