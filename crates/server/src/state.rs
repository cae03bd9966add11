//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::HouseConfig;
use crate::db::Store;
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::menu::MenuService;
use crate::services::notify::Notifier;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, the services built on it and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: HouseConfig,
    store: Arc<dyn Store>,
    auth: AuthService,
    menu: MenuService,
    cart: CartService,
    checkout: CheckoutService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Storage backend (`PgStore` or `MemoryStore`)
    /// * `notifier` - Delivery for verification codes
    #[must_use]
    pub fn new(config: HouseConfig, store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        let auth = AuthService::new(store.clone(), notifier);
        let menu = MenuService::new(store.clone());
        let cart = CartService::new(store.clone(), menu.clone());
        let checkout = CheckoutService::new(store.clone(), cart.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                auth,
                menu,
                cart,
                checkout,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &HouseConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn menu(&self) -> &MenuService {
        &self.inner.menu
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }
}
