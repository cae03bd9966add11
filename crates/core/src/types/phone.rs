//! Phone number type.
//!
//! Numbers are normalized to E.164 form (`+60...`) before validation so that
//! `012-345 6789`, `60123456789` and `+60123456789` all name the same account.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Malaysian mobile numbers: `+60 1x` followed by 7 or 8 more digits.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+601\d{8,9}$").expect("phone pattern is a valid regex"));

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains characters other than digits and separators.
    #[error("phone number may only contain digits, spaces, dashes and a leading +")]
    InvalidCharacters,
    /// The normalized number is not a Malaysian mobile number.
    #[error("phone number must be a Malaysian mobile number, e.g. +60123456789")]
    Malformed,
}

/// A mobile phone number in E.164 form.
///
/// ## Examples
///
/// ```
/// use taiwanese_house_core::PhoneNumber;
///
/// assert!(PhoneNumber::parse("+60123456789").is_ok());
/// assert_eq!(
///     PhoneNumber::parse("012-345 6789").map(|p| p.into_inner()),
///     Ok("+60123456789".to_string())
/// );
/// assert!(PhoneNumber::parse("123").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse and normalize a `PhoneNumber`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains letters or other
    /// symbols, or does not normalize to a Malaysian mobile number.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let (plus, rest) = s.strip_prefix('+').map_or((false, s), |rest| (true, rest));

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidCharacters),
            }
        }

        let normalized = if plus {
            format!("+{digits}")
        } else if let Some(local) = digits.strip_prefix('0') {
            format!("+60{local}")
        } else {
            format!("+{digits}")
        };

        if !PHONE_PATTERN.is_match(&normalized) {
            return Err(PhoneError::Malformed);
        }

        Ok(Self(normalized))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PhoneNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Masked form showing only the last four digits, e.g. `+60*****6789`.
    #[must_use]
    pub fn masked(&self) -> String {
        let visible = self.0.len().saturating_sub(4);
        let tail = self.0.get(visible..).unwrap_or_default();
        let hidden = visible.saturating_sub(3);
        format!("+60{}{tail}", "*".repeat(hidden))
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}
