//! Cart editing and live cart sync.
//!
//! Every change publishes a [`CartEvent::Snapshot`] on the user's broadcast
//! channel, so other open sessions (phone and laptop, say) stay in step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::instrument;

use taiwanese_house_core::cart::{CartError, CartItem, CartLine, CartSelection, validate_quantity};
use taiwanese_house_core::pricing::{PriceQuote, quote};
use taiwanese_house_core::{CartItemId, Coins, UserId};

use crate::db::{RepositoryError, Store};
use crate::services::menu::{MenuService, MenuServiceError};

/// Buffered events per user before slow subscribers start lagging.
const EVENT_BUFFER: usize = 16;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("user not found")]
    UserNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("menu error: {0}")]
    Menu(#[from] MenuServiceError),
}

/// Cart lines with their price breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub quote: PriceQuote,
}

impl CartView {
    fn new(items: Vec<CartItem>, requested: Coins, available: Coins) -> Self {
        let quote = quote(items.iter().map(|i| &i.line), requested, available);
        Self { items, quote }
    }
}

/// Pushed to every open cart stream of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    /// The whole cart after a change, quoted without coins.
    Snapshot(CartView),
}

/// Cart operations for signed-in users.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    menu: MenuService,
    channels: Arc<Mutex<HashMap<UserId, broadcast::Sender<CartEvent>>>>,
}

impl CartService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, menu: MenuService) -> Self {
        Self {
            store,
            menu,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The cart, quoted with up to `requested` coins.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::UserNotFound` if the account is gone.
    #[instrument(skip(self))]
    pub async fn view(&self, user: UserId, requested: Coins) -> Result<CartView, CartServiceError> {
        let available = self.balance(user).await?;
        let items = self.store.cart_items(user).await?;
        Ok(CartView::new(items, requested, available))
    }

    /// Add a menu selection, merging with an identical line.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the selection does not fit the menu item.
    #[instrument(skip(self, selection), fields(menu_item_id = %selection.menu_item_id))]
    pub async fn add(
        &self,
        user: UserId,
        selection: &CartSelection,
    ) -> Result<CartView, CartServiceError> {
        let item = match self.menu.item(selection.menu_item_id).await {
            Ok(item) => item,
            Err(MenuServiceError::NotFound(id)) => return Err(CartError::UnknownItem(id).into()),
            Err(e) => return Err(e.into()),
        };
        let line = CartLine::resolve(&item, selection)?;

        self.store.add_cart_line(user, line).await?;
        self.changed(user).await
    }

    /// Set the quantity of one line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` outside `1..=99` and
    /// `CartError::LineNotFound` for a line that is not in this user's cart.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartView, CartServiceError> {
        validate_quantity(quantity)?;
        self.store
            .set_cart_quantity(user, id, quantity)
            .await
            .map_err(|e| line_not_found(e, id))?;
        self.changed(user).await
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` for a line that is not in this
    /// user's cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, user: UserId, id: CartItemId) -> Result<CartView, CartServiceError> {
        self.store
            .remove_cart_item(user, id)
            .await
            .map_err(|e| line_not_found(e, id))?;
        self.changed(user).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user: UserId) -> Result<CartView, CartServiceError> {
        self.store.clear_cart(user).await?;
        self.changed(user).await
    }

    /// Listen for changes to a user's cart.
    ///
    /// Channels whose streams have all gone away are dropped here too.
    #[must_use]
    pub fn subscribe(&self, user: UserId) -> broadcast::Receiver<CartEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(user)
            .or_insert_with(|| broadcast::channel(EVENT_BUFFER).0)
            .subscribe()
    }

    /// Send the current cart to every subscriber of `user`.
    ///
    /// Best effort: if the cart cannot be loaded nothing is sent and the
    /// failure is only logged.
    pub async fn publish_snapshot(&self, user: UserId) {
        if let Err(e) = self.changed(user).await {
            tracing::warn!(user_id = %user, error = %e, "Failed to publish cart snapshot");
        }
    }

    async fn changed(&self, user: UserId) -> Result<CartView, CartServiceError> {
        let view = self.view(user, Coins::ZERO).await?;
        self.publish(user, CartEvent::Snapshot(view.clone()));
        Ok(view)
    }

    fn publish(&self, user: UserId, event: CartEvent) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let closed = channels
            .get(&user)
            .is_some_and(|sender| sender.receiver_count() == 0 || sender.send(event).is_err());
        // Every stream for this user has gone away.
        if closed {
            channels.remove(&user);
        }
    }

    async fn balance(&self, user: UserId) -> Result<Coins, CartServiceError> {
        self.store
            .user_by_id(user)
            .await?
            .map(|u| u.coins)
            .ok_or(CartServiceError::UserNotFound)
    }
}

fn line_not_found(e: RepositoryError, id: CartItemId) -> CartServiceError {
    match e {
        RepositoryError::NotFound => CartError::LineNotFound(id).into(),
        other => other.into(),
    }
}
