//! User domain types that never leave the server.

use taiwanese_house_core::account::DisplayName;
use taiwanese_house_core::{Email, PhoneNumber};

/// A validated signup, with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: DisplayName,
    pub email: Email,
    pub phone: PhoneNumber,
    /// Argon2id PHC string.
    pub password_hash: String,
}
