//! Turning a cart into an order.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::instrument;

use taiwanese_house_core::order::{NewOrder, Order};
use taiwanese_house_core::payment::{PaymentDetails, PaymentError};
use taiwanese_house_core::pricing::quote;
use taiwanese_house_core::{Coins, OrderId, PaymentStatus, UserId};

use crate::db::{RepositoryError, Store};
use crate::services::cart::CartService;

/// Errors from placing or reading orders.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("payment was declined")]
    PaymentDeclined,

    /// The balance dropped between quoting and placing the order.
    #[error("not enough coins")]
    InsufficientCoins,

    #[error("order not found")]
    OrderNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout and order history.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    cart: CartService,
}

impl CheckoutService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cart: CartService) -> Self {
        Self { store, cart }
    }

    /// Place an order for everything in the cart.
    ///
    /// Up to `coins` are redeemed, capped by the balance and subtotal. On
    /// success the ordered lines leave the cart, earned coins are credited and
    /// subscribers get a fresh snapshot. Lines added from another session
    /// while the order is placed stay in the cart. A declined payment changes
    /// nothing.
    ///
    /// `today` decides whether a card has expired.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, a [`PaymentError`] for bad
    /// details, or `CheckoutError::PaymentDeclined`.
    #[instrument(skip(self, payment))]
    pub async fn checkout(
        &self,
        user: UserId,
        coins: Coins,
        payment: &PaymentDetails,
        today: NaiveDate,
    ) -> Result<Order, CheckoutError> {
        let items = self.store.cart_items(user).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let profile = self
            .store
            .user_by_id(user)
            .await?
            .ok_or(CheckoutError::UserNotFound)?;

        let cart_item_ids = items.iter().map(|i| i.id).collect();
        let lines: Vec<_> = items.into_iter().map(|i| i.line).collect();
        let quote = quote(&lines, coins, profile.coins);

        let payment = payment.validate(today)?;
        let payment_status = payment.simulate();
        if payment_status == PaymentStatus::Failed {
            tracing::info!(user_id = %user, method = %payment.method, "Payment declined");
            return Err(CheckoutError::PaymentDeclined);
        }

        let order = self
            .store
            .place_order(NewOrder {
                user_id: user,
                cart_item_ids,
                lines,
                quote,
                payment,
                payment_status,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CheckoutError::InsufficientCoins,
                RepositoryError::NotFound => CheckoutError::UserNotFound,
                other => CheckoutError::Repository(other),
            })?;

        tracing::info!(
            user_id = %user,
            order_id = %order.id,
            items = order.item_count(),
            total = %order.quote.total,
            coins_applied = %order.quote.coins_applied,
            coins_earned = %order.quote.coins_earned,
            "Order placed"
        );

        // The order is committed; publishing cannot fail the request.
        self.cart.publish_snapshot(user).await;
        Ok(order)
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn orders(&self, user: UserId) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.store.orders_for(user).await?)
    }

    /// One of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if it does not exist or belongs
    /// to someone else.
    pub async fn order(&self, user: UserId, id: OrderId) -> Result<Order, CheckoutError> {
        self.store
            .order(user, id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)
    }
}
