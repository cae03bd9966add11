//! Loyalty coin balance.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Price;

/// A number of loyalty coins.
///
/// One coin is worth [`Coins::VALUE_SEN`] sen when redeemed at checkout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Coins(u32);

impl Coins {
    /// Zero coins.
    pub const ZERO: Self = Self(0);

    /// Value of a single coin in sen (0.01 MYR).
    pub const VALUE_SEN: i64 = 1;

    /// Create a coin amount.
    #[must_use]
    pub const fn new(count: u32) -> Self {
        Self(count)
    }

    /// The raw coin count.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.0
    }

    /// Ringgit value of these coins when redeemed.
    #[must_use]
    pub fn value(&self) -> Price {
        Price::new(Decimal::from(self.0) * Decimal::new(Self::VALUE_SEN, 2))
    }

    /// Add coins, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtract coins, returning `None` if the balance would go negative.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} coins", self.0)
    }
}

impl From<u32> for Coins {
    fn from(count: u32) -> Self {
        Self(count)
    }
}

impl From<Coins> for u32 {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}
