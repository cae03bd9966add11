//! Type-safe price representation using decimal arithmetic.
//!
//! All prices are in Malaysian ringgit (MYR). The restaurant only trades in
//! one currency, so the currency is implied rather than carried per value.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price in ringgit.
///
/// Serialized as a decimal string (`"12.50"`) so clients never see binary
/// floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero ringgit.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of sen (1/100 ringgit).
    #[must_use]
    pub fn from_sen(sen: i64) -> Self {
        Self(Decimal::new(sen, 2))
    }

    /// The decimal amount in ringgit.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the price is negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Round half-up to 2 decimal places.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Subtract, flooring the result at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RM {:.2}", self.rounded().0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Price::from_sen(1250).to_string(), "RM 12.50");
        assert_eq!(Price::from_sen(7).to_string(), "RM 0.07");
        assert_eq!(Price::ZERO.to_string(), "RM 0.00");
    }

    #[test]
    fn test_display_rounds_half_up() {
        assert_eq!(Price::new(Decimal::new(12345, 3)).to_string(), "RM 12.35");
    }

    #[test]
    fn test_arithmetic() {
        let a = Price::from_sen(850);
        let b = Price::from_sen(150);
        assert_eq!(a + b, Price::from_sen(1000));
        assert_eq!(a - b, Price::from_sen(700));
        assert_eq!(a * 3, Price::from_sen(2550));
        assert_eq!([a, b].iter().sum::<Price>(), Price::from_sen(1000));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Price::from_sen(100);
        assert_eq!(a.saturating_sub(Price::from_sen(250)), Price::ZERO);
        assert_eq!(a.saturating_sub(Price::from_sen(25)), Price::from_sen(75));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Price::from_sen(1250)).ok();
        assert_eq!(json.as_deref(), Some("\"12.50\""));
    }

    #[test]
    fn test_is_negative() {
        assert!(Price::from_sen(-1).is_negative());
        assert!(!Price::ZERO.is_negative());
    }
}
