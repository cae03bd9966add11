//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use taiwanese_house_core::UserId;
use taiwanese_house_core::account::{DisplayName, UserProfile};
use taiwanese_house_core::flow::LoginMethod;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Display name at login time.
    pub name: DisplayName,
    /// How the user signed in.
    pub method: LoginMethod,
}

impl CurrentUser {
    #[must_use]
    pub fn new(profile: &UserProfile, method: LoginMethod) -> Self {
        Self {
            id: profile.id,
            name: profile.name.clone(),
            method,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the password recovery step (`RecoveryStep`).
    pub const RECOVERY: &str = "recovery";
}
