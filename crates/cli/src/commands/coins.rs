//! Loyalty coin management.
//!
//! # Usage
//!
//! ```bash
//! th-cli coins grant -e mei@example.com -a 500
//! ```

use thiserror::Error;

use taiwanese_house_core::Email;
use taiwanese_house_server::db::{PgStore, RepositoryError, UserStore};

use super::{CommandError, connect};

/// Errors that can occur while granting coins.
#[derive(Debug, Error)]
pub enum CoinsError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("No customer with email: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Credit `amount` coins to the customer with this email.
///
/// # Errors
///
/// Returns an error if the email is invalid, no such customer exists, or the
/// database update fails.
pub async fn grant(email: &str, amount: u32) -> Result<(), CoinsError> {
    let email = Email::parse(email).map_err(|_| CoinsError::InvalidEmail(email.to_owned()))?;
    if amount == 0 {
        return Err(CoinsError::ZeroAmount);
    }

    let store = PgStore::new(connect().await?);
    let user = store
        .user_by_email(&email)
        .await?
        .ok_or_else(|| CoinsError::UserNotFound(email.to_string()))?;

    let balance = store.adjust_coins(user.id, i64::from(amount)).await?;

    tracing::info!(
        user_id = %user.id,
        email = %email.masked(),
        granted = amount,
        %balance,
        "Coins granted"
    );
    Ok(())
}
