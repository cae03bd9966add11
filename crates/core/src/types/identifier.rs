//! Login identifier: an email address or a phone number.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::{Email, EmailError, PhoneError, PhoneNumber};

/// What a user typed into the "email or phone" field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identifier {
    Email(Email),
    Phone(PhoneNumber),
}

/// Errors that can occur when parsing an [`Identifier`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Phone(#[from] PhoneError),
}

impl Identifier {
    /// Classify and parse raw input. Anything containing `@` is treated as an
    /// email address, everything else as a phone number.
    ///
    /// # Errors
    ///
    /// Returns the underlying email or phone validation error.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        if s.contains('@') {
            Ok(Self::Email(Email::parse(s)?))
        } else {
            Ok(Self::Phone(PhoneNumber::parse(s)?))
        }
    }

    /// Masked destination for "we sent a code to ..." messages.
    #[must_use]
    pub fn masked(&self) -> String {
        match self {
            Self::Email(email) => email.masked(),
            Self::Phone(phone) => phone.masked(),
        }
    }

    /// Returns the normalized identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(email) => email.as_str(),
            Self::Phone(phone) => phone.as_str(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Email> for Identifier {
    fn from(email: Email) -> Self {
        Self::Email(email)
    }
}

impl From<PhoneNumber> for Identifier {
    fn from(phone: PhoneNumber) -> Self {
        Self::Phone(phone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_email() {
        assert!(matches!(
            Identifier::parse("a@b.com"),
            Ok(Identifier::Email(_))
        ));
    }

    #[test]
    fn test_classifies_phone() {
        assert!(matches!(
            Identifier::parse("0123456789"),
            Ok(Identifier::Phone(_))
        ));
    }

    #[test]
    fn test_reports_underlying_error() {
        assert_eq!(
            Identifier::parse("a@b"),
            Err(IdentifierError::Email(EmailError::Malformed))
        );
        assert_eq!(
            Identifier::parse("123"),
            Err(IdentifierError::Phone(PhoneError::Malformed))
        );
    }
}
