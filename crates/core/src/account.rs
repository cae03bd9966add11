//! Profile, password and feedback validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Coins, Email, FeedbackId, PhoneNumber, UserId};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 input is bounded to keep hashing cheap).
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum display-name length, in characters.
pub const MAX_NAME_LENGTH: usize = 60;

/// Maximum feedback message length, in characters.
pub const MAX_FEEDBACK_LENGTH: usize = 1000;

/// Field-level validation errors for account forms.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    PasswordTooLong,
    #[error("password must contain at least one letter and one digit")]
    PasswordTooSimple,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("rating must be between 1 and 5")]
    Rating,
    #[error("feedback cannot be empty")]
    EmptyFeedback,
    #[error("feedback must be at most {MAX_FEEDBACK_LENGTH} characters")]
    FeedbackTooLong,
    #[error("nothing to update")]
    NoChanges,
}

/// A user's display name, trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Parse a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed name is empty or too long.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if s.chars().count() > MAX_NAME_LENGTH {
            return Err(ValidationError::NameTooLong);
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a new password against the policy and its confirmation.
///
/// # Errors
///
/// Returns the first rule the password breaks.
pub fn validate_password(password: &str, confirmation: Option<&str>) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong);
    }
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(ValidationError::PasswordTooSimple);
    }
    if confirmation.is_some_and(|c| c != password) {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Account details shown on the profile screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: DisplayName,
    pub email: Email,
    pub phone: PhoneNumber,
    pub coins: Coins,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated partial profile edit. At least one field is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<DisplayName>,
    pub email: Option<Email>,
    pub phone: Option<PhoneNumber>,
}

impl ProfileUpdate {
    /// Whether applying this update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// Apply the update to a profile in place.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            profile.phone = phone.clone();
        }
    }
}

/// A 1-5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Parse a rating.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Rating`] outside `1..=5`.
    pub const fn new(stars: u8) -> Result<Self, ValidationError> {
        if stars == 0 || stars > 5 {
            return Err(ValidationError::Rating);
        }
        Ok(Self(stars))
    }

    #[must_use]
    pub const fn stars(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Feedback ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
    pub user_id: UserId,
    pub rating: Rating,
    pub message: String,
}

impl NewFeedback {
    /// Validate a feedback submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the rating is out of range or the trimmed message
    /// is empty or too long.
    pub fn new(user_id: UserId, rating: u8, message: &str) -> Result<Self, ValidationError> {
        let rating = Rating::new(rating)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyFeedback);
        }
        if message.chars().count() > MAX_FEEDBACK_LENGTH {
            return Err(ValidationError::FeedbackTooLong);
        }
        Ok(Self {
            user_id,
            rating,
            message: message.to_string(),
        })
    }
}

/// Stored feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: FeedbackId,
    pub user_id: UserId,
    pub rating: Rating,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
