//! Authentication error types.

use thiserror::Error;

use taiwanese_house_core::account::ValidationError;
use taiwanese_house_core::flow::FlowError;
use taiwanese_house_core::{EmailError, IdentifierError, PhoneError};

use crate::db::RepositoryError;
use crate::services::notify::NotifyError;
use crate::services::verification::VerificationError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid phone number format.
    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// Neither a valid email nor a valid phone number.
    #[error("invalid email or phone number: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    /// Name, password or other input broke a rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Email or phone already belongs to another account.
    #[error("an account with this email or phone number already exists")]
    UserAlreadyExists,

    /// Verification code or multi-step flow problem.
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Code could not be delivered.
    #[error("could not send verification code: {0}")]
    Notify(#[from] NotifyError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<VerificationError> for AuthError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Flow(e) => Self::Flow(e),
            VerificationError::Repository(e) => Self::Repository(e),
            VerificationError::Notify(e) => Self::Notify(e),
        }
    }
}
