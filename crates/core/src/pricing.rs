//! Cart totals and loyalty-coin discounts.
//!
//! ```text
//! subtotal  = Σ (base price + add-ons) × quantity
//! applied   = min(requested, available, floor(subtotal × 100))
//! discount  = applied × 0.01
//! total     = subtotal - discount
//! earned    = floor(total)           (1 coin per whole ringgit paid)
//! ```

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::{Coins, Price};

/// Coins earned per whole ringgit of the amount paid.
pub const COINS_PER_RINGGIT: u32 = 1;

/// Breakdown shown on the cart and checkout screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub subtotal: Price,
    pub coins_applied: Coins,
    pub discount: Price,
    pub total: Price,
    pub coins_earned: Coins,
}

/// Sum of all line totals.
pub fn subtotal<'a>(lines: impl IntoIterator<Item = &'a CartLine>) -> Price {
    lines.into_iter().map(CartLine::line_total).sum()
}

/// Coins that can actually be redeemed against `subtotal`.
///
/// Capped by what was requested, what the user has, and the subtotal itself
/// (a discount never exceeds the amount owed).
#[must_use]
pub fn redeemable_coins(requested: Coins, available: Coins, subtotal: Price) -> Coins {
    let cap = max_coins_for(subtotal);
    requested.min(available).min(cap)
}

/// Ringgit discount for redeeming coins against `subtotal`.
#[must_use]
pub fn coin_discount(requested: Coins, available: Coins, subtotal: Price) -> Price {
    redeemable_coins(requested, available, subtotal).value()
}

/// Coins earned for paying `total`.
#[must_use]
pub fn coins_earned(total: Price) -> Coins {
    let whole = total.amount().floor().to_u32().unwrap_or(0);
    Coins::new(whole.saturating_mul(COINS_PER_RINGGIT))
}

/// Full checkout quote for a set of lines.
pub fn quote<'a>(
    lines: impl IntoIterator<Item = &'a CartLine>,
    requested: Coins,
    available: Coins,
) -> PriceQuote {
    let subtotal = subtotal(lines);
    let coins_applied = redeemable_coins(requested, available, subtotal);
    let discount = coins_applied.value();
    let total = subtotal.saturating_sub(discount);

    PriceQuote {
        subtotal,
        coins_applied,
        discount,
        total,
        coins_earned: coins_earned(total),
    }
}

/// `floor(subtotal × 100)`, the most coins a subtotal can absorb.
fn max_coins_for(subtotal: Price) -> Coins {
    if subtotal.is_negative() {
        return Coins::ZERO;
    }
    let sen = (subtotal.amount() * Decimal::ONE_HUNDRED).floor();
    Coins::new(sen.to_u32().unwrap_or(u32::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::CartSelection;
    use crate::menu::fixtures::{lu_rou_fan, milk_tea};
    use crate::{AddOnId, MenuItemId};

    fn lines() -> Vec<CartLine> {
        vec![
            // (12.90 + 2.00) × 2 = 29.80
            CartLine::resolve(
                &lu_rou_fan(),
                &CartSelection {
                    menu_item_id: MenuItemId::new(1),
                    quantity: 2,
                    add_on_ids: vec![AddOnId::new(10)],
                    removals: Vec::new(),
                    note: None,
                },
            )
            .unwrap(),
            // 8.50 × 3 = 25.50
            CartLine::resolve(
                &milk_tea(),
                &CartSelection {
                    menu_item_id: MenuItemId::new(2),
                    quantity: 3,
                    add_on_ids: Vec::new(),
                    removals: Vec::new(),
                    note: None,
                },
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_subtotal() {
        assert_eq!(subtotal(&lines()), Price::from_sen(5530));
        assert_eq!(subtotal(&[]), Price::ZERO);
    }

    #[test]
    fn test_discount_capped_by_request() {
        let d = coin_discount(Coins::new(100), Coins::new(500), Price::from_sen(5530));
        assert_eq!(d, Price::from_sen(100));
    }

    #[test]
    fn test_discount_capped_by_balance() {
        let d = coin_discount(Coins::new(1000), Coins::new(250), Price::from_sen(5530));
        assert_eq!(d, Price::from_sen(250));
    }

    #[test]
    fn test_discount_capped_by_subtotal() {
        let d = coin_discount(Coins::new(10_000), Coins::new(10_000), Price::from_sen(5530));
        assert_eq!(d, Price::from_sen(5530));
    }

    #[test]
    fn test_discount_floors_fractional_sen() {
        let subtotal = Price::new(Decimal::new(10_059, 3)); // 10.059
        assert_eq!(
            redeemable_coins(Coins::new(5000), Coins::new(5000), subtotal),
            Coins::new(1005)
        );
    }

    #[test]
    fn test_quote() {
        let q = quote(&lines(), Coins::new(530), Coins::new(1000));
        assert_eq!(q.subtotal, Price::from_sen(5530));
        assert_eq!(q.coins_applied, Coins::new(530));
        assert_eq!(q.discount, Price::from_sen(530));
        assert_eq!(q.total, Price::from_sen(5000));
        assert_eq!(q.coins_earned, Coins::new(50));
    }

    #[test]
    fn test_quote_full_coin_payment_is_free() {
        let q = quote(&lines(), Coins::new(u32::MAX), Coins::new(u32::MAX));
        assert_eq!(q.total, Price::ZERO);
        assert_eq!(q.coins_earned, Coins::ZERO);
    }

    #[test]
    fn test_quote_empty_cart() {
        let q = quote(&[], Coins::new(100), Coins::new(100));
        assert_eq!(q.coins_applied, Coins::ZERO);
        assert_eq!(q.total, Price::ZERO);
    }

    #[test]
    fn test_coins_earned_floors() {
        assert_eq!(coins_earned(Price::from_sen(1299)), Coins::new(12));
        assert_eq!(coins_earned(Price::from_sen(99)), Coins::ZERO);
    }
}
