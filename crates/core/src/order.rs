//! Placed orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::payment::{CardSummary, EWalletProvider, ValidatedPayment};
use crate::pricing::PriceQuote;
use crate::{CartItemId, OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus, Price, UserId};

/// The payment attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Price,
    pub card: Option<CardSummary>,
    pub provider: Option<EWalletProvider>,
}

/// An order as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Snapshot of the cart at checkout.
    pub lines: Vec<CartLine>,
    pub quote: PriceQuote,
    pub status: OrderStatus,
    pub payment: Payment,
    pub created_at: DateTime<Utc>,
}

/// An order ready to be stored.
///
/// Placing it must atomically deduct `quote.coins_applied`, credit
/// `quote.coins_earned` and remove the cart rows in `cart_item_ids`. Rows
/// added after the cart was read stay in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    /// Cart rows the order was quoted from.
    pub cart_item_ids: Vec<CartItemId>,
    pub lines: Vec<CartLine>,
    pub quote: PriceQuote,
    pub payment: ValidatedPayment,
    pub payment_status: PaymentStatus,
}

impl Order {
    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}
