//! Simulated payment details and card checks.
//!
//! No money moves. Card details are checked for shape (Luhn, expiry, CVV)
//! and only the brand and last four digits are kept on the order.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{PaymentMethod, PaymentStatus};

/// Card numbers ending in these digits are declined by the simulator.
pub const DECLINED_CARD_SUFFIX: &str = "0000";

/// Errors found in submitted payment details.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("card number must be 13 to 19 digits")]
    CardNumberLength,
    #[error("card number is not valid")]
    CardNumberChecksum,
    #[error("expiry must be in MM/YY format")]
    ExpiryFormat,
    #[error("card has expired")]
    Expired,
    #[error("CVV must be 3 or 4 digits")]
    Cvv,
    #[error("cardholder name is required")]
    HolderName,
}

/// Supported e-wallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EWalletProvider {
    TouchNGo,
    GrabPay,
    Boost,
    ShopeePay,
}

impl EWalletProvider {
    /// Wire and storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TouchNGo => "touch_n_go",
            Self::GrabPay => "grab_pay",
            Self::Boost => "boost",
            Self::ShopeePay => "shopee_pay",
        }
    }
}

impl std::str::FromStr for EWalletProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "touch_n_go" => Ok(Self::TouchNGo),
            "grab_pay" => Ok(Self::GrabPay),
            "boost" => Ok(Self::Boost),
            "shopee_pay" => Ok(Self::ShopeePay),
            _ => Err(format!("invalid e-wallet provider: {s}")),
        }
    }
}

/// Payment details as submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentDetails {
    Cash,
    Card {
        number: String,
        expiry: String,
        cvv: String,
        holder: String,
    },
    #[serde(rename = "ewallet")]
    EWallet { provider: EWalletProvider },
}

/// Card network inferred from the number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Other,
}

/// What is kept about a card after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub brand: CardBrand,
    pub last4: String,
}

/// Payment details that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedPayment {
    pub method: PaymentMethod,
    pub card: Option<CardSummary>,
    pub provider: Option<EWalletProvider>,
}

impl PaymentDetails {
    /// Check the details and strip everything sensitive.
    ///
    /// `today` decides whether a card has expired.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] describing the first invalid field.
    pub fn validate(&self, today: NaiveDate) -> Result<ValidatedPayment, PaymentError> {
        match self {
            Self::Cash => Ok(ValidatedPayment {
                method: PaymentMethod::Cash,
                card: None,
                provider: None,
            }),
            Self::Card {
                number,
                expiry,
                cvv,
                holder,
            } => {
                if holder.trim().is_empty() {
                    return Err(PaymentError::HolderName);
                }
                let digits = card_digits(number)?;
                check_expiry(expiry, today)?;
                if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
                    return Err(PaymentError::Cvv);
                }
                let last4 = digits
                    .get(digits.len().saturating_sub(4)..)
                    .unwrap_or_default()
                    .to_string();
                Ok(ValidatedPayment {
                    method: PaymentMethod::Card,
                    card: Some(CardSummary {
                        brand: card_brand(&digits),
                        last4,
                    }),
                    provider: None,
                })
            }
            Self::EWallet { provider } => Ok(ValidatedPayment {
                method: PaymentMethod::EWallet,
                card: None,
                provider: Some(*provider),
            }),
        }
    }
}

impl ValidatedPayment {
    /// Result of the simulated charge.
    ///
    /// Cash is settled at the counter, so it stays pending. Cards ending in
    /// [`DECLINED_CARD_SUFFIX`] are declined; everything else is paid.
    #[must_use]
    pub fn simulate(&self) -> PaymentStatus {
        match (&self.method, &self.card) {
            (PaymentMethod::Cash, _) => PaymentStatus::Pending,
            (PaymentMethod::Card, Some(card)) if card.last4 == DECLINED_CARD_SUFFIX => {
                PaymentStatus::Failed
            }
            _ => PaymentStatus::Paid,
        }
    }
}

/// Strip separators, check length and Luhn checksum.
fn card_digits(number: &str) -> Result<String, PaymentError> {
    let digits: String = number.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) || !(13..=19).contains(&digits.len()) {
        return Err(PaymentError::CardNumberLength);
    }
    if !luhn_valid(&digits) {
        return Err(PaymentError::CardNumberChecksum);
    }
    Ok(digits)
}

/// Luhn mod-10 checksum over ASCII digits.
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

fn card_brand(digits: &str) -> CardBrand {
    let prefix2: u32 = digits.get(..2).and_then(|p| p.parse().ok()).unwrap_or(0);
    let prefix4: u32 = digits.get(..4).and_then(|p| p.parse().ok()).unwrap_or(0);
    if digits.starts_with('4') {
        CardBrand::Visa
    } else if (51..=55).contains(&prefix2) || (2221..=2720).contains(&prefix4) {
        CardBrand::Mastercard
    } else if prefix2 == 34 || prefix2 == 37 {
        CardBrand::Amex
    } else {
        CardBrand::Other
    }
}

/// `MM/YY`, valid through the last day of that month.
fn check_expiry(expiry: &str, today: NaiveDate) -> Result<(), PaymentError> {
    let (mm, yy) = expiry.trim().split_once('/').ok_or(PaymentError::ExpiryFormat)?;
    if mm.len() != 2 || yy.len() != 2 {
        return Err(PaymentError::ExpiryFormat);
    }
    let month: u32 = mm.parse().map_err(|_| PaymentError::ExpiryFormat)?;
    let year: i32 = yy.parse().map_err(|_| PaymentError::ExpiryFormat)?;
    if !(1..=12).contains(&month) {
        return Err(PaymentError::ExpiryFormat);
    }
    let year = 2000 + year;
    if (year, month) < (today.year(), today.month()) {
        return Err(PaymentError::Expired);
    }
    Ok(())
}
