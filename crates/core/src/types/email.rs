//! Email address type.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Accepted shape: local part, `@`, then at least one dot-separated label
/// before a top-level label of two or more characters.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.+-]+@([\w-]+\.)+[\w-]{2,}$").expect("email pattern is a valid regex")
});

/// Why an email address was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong {
        max: usize,
    },
    /// The input does not look like `name@domain.tld`.
    #[error("email address is not valid")]
    Malformed,
}

/// An email address.
///
/// Input is trimmed and lowercased so the same mailbox always maps to the
/// same account.
///
/// ## Constraints
///
/// - At most 254 characters
/// - Local part of word characters, `.`, `+` or `-`
/// - Domain with at least one dot and a top-level label of 2+ characters
///
/// ## Examples
///
/// ```
/// use taiwanese_house_core::Email;
///
/// assert!(Email::parse("a@b.com").is_ok());
/// assert!(Email::parse("mei.lin+orders@taiwanesehouse.my").is_ok());
///
/// assert!(Email::parse("").is_err());
/// assert!(Email::parse("a@b").is_err());
/// assert!(Email::parse("no-at-symbol").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Trim, check and lowercase an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than 254
    /// characters, or not shaped like an email address.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !EMAIL_PATTERN.is_match(s) {
            return Err(EmailError::Malformed);
        }

        Ok(Self(s.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form for logs and "code sent to" messages, e.g. `j***@mail.com`.
    #[must_use]
    pub fn masked(&self) -> String {
        let (local, domain) = self.0.split_once('@').unwrap_or((&self.0, ""));
        let first = local.chars().next().unwrap_or('*');
        format!("{first}***@{domain}")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_shapes() {
        for ok in [
            "a@b.com",
            "mei.lin@gmail.com",
            "orders+th@taiwanesehouse.my",
            "staff@kl.taiwanesehouse.my",
            "  padded@example.my  ",
        ] {
            assert!(Email::parse(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_parse_rejects_missing_tld() {
        assert_eq!(Email::parse("a@b"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("a@b.c"), Err(EmailError::Malformed));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
    }

    #[test]
    fn test_length_limit() {
        let address = format!("{}@taiwanesehouse.my", "x".repeat(Email::MAX_LENGTH));
        assert_eq!(
            Email::parse(&address),
            Err(EmailError::TooLong {
                max: Email::MAX_LENGTH
            })
        );
    }

    #[test]
    fn test_length_counts_characters() {
        // 200 characters, 400 bytes.
        let address = format!("{}@taiwanesehouse.my", "é".repeat(200));
        assert!(address.len() > Email::MAX_LENGTH);
        assert!(Email::parse(&address).is_ok());
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(Email::parse("no-at-symbol"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("@domain.com"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("user@"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("us er@domain.com"), Err(EmailError::Malformed));
    }

    #[test]
    fn test_lowercases() {
        let email = Email::parse("Jane.Doe@Example.COM").unwrap();
        assert_eq!(email.as_str(), "jane.doe@example.com");
    }

    #[test]
    fn test_masked() {
        let email = Email::parse("jane@mail.com").unwrap();
        assert_eq!(email.masked(), "j***@mail.com");
    }

    #[test]
    fn test_deserialize_normalizes_and_validates() {
        let email: Email = serde_json::from_str("\" Mei@Example.com \"").unwrap();
        assert_eq!(email.as_str(), "mei@example.com");
        assert!(serde_json::from_str::<Email>("\"a@b\"").is_err());
    }
}
