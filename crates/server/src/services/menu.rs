//! Menu reads with a short-lived cache.
//!
//! The grouped menu is cached with `moka` (5-minute TTL). Writes go straight
//! to the store and drop the cached copy.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};

use taiwanese_house_core::MenuItemId;
use taiwanese_house_core::menu::{Menu, MenuCategory, MenuError, MenuItem, validate_menu};

use crate::db::{RepositoryError, Store};

const MENU_KEY: &str = "menu";

/// Errors from reading or changing the menu.
#[derive(Debug, Error)]
pub enum MenuServiceError {
    #[error("menu item {0} not found")]
    NotFound(MenuItemId),

    #[error("invalid menu: {}", summarize(.0))]
    Invalid(Vec<MenuError>),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

fn summarize(errors: &[MenuError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cached access to the menu.
#[derive(Clone)]
pub struct MenuService {
    store: Arc<dyn Store>,
    cache: Cache<&'static str, Arc<Menu>>,
}

impl MenuService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self { store, cache }
    }

    /// The full menu, grouped by category.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[instrument(skip(self))]
    pub async fn menu(&self) -> Result<Arc<Menu>, MenuServiceError> {
        if let Some(menu) = self.cache.get(MENU_KEY).await {
            debug!("Cache hit for menu");
            return Ok(menu);
        }

        let (categories, items) = (self.store.categories().await?, self.store.menu_items().await?);
        let menu = Arc::new(Menu::group(categories, items));

        self.cache.insert(MENU_KEY, menu.clone()).await;
        Ok(menu)
    }

    /// A single item, sold out or not.
    ///
    /// # Errors
    ///
    /// Returns `MenuServiceError::NotFound` if no such item exists.
    #[instrument(skip(self))]
    pub async fn item(&self, id: MenuItemId) -> Result<MenuItem, MenuServiceError> {
        if let Some(item) = self.menu().await?.item(id) {
            return Ok(item.clone());
        }
        // Items outside any category never make it into the grouped menu.
        self.store
            .menu_item(id)
            .await?
            .ok_or(MenuServiceError::NotFound(id))
    }

    /// Validate and store a menu definition.
    ///
    /// With `clear`, everything not in the definition is removed first.
    ///
    /// # Errors
    ///
    /// Returns `MenuServiceError::Invalid` with every problem found, in which
    /// case nothing is written.
    #[instrument(skip(self, categories, items), fields(categories = categories.len(), items = items.len()))]
    pub async fn import(
        &self,
        categories: &[MenuCategory],
        items: &[MenuItem],
        clear: bool,
    ) -> Result<(), MenuServiceError> {
        let errors = validate_menu(categories, items);
        if !errors.is_empty() {
            return Err(MenuServiceError::Invalid(errors));
        }

        if clear {
            self.store.clear_menu().await?;
        }
        for category in categories {
            self.store.upsert_category(category).await?;
        }
        for item in items {
            self.store.upsert_menu_item(item).await?;
        }

        self.invalidate().await;
        Ok(())
    }

    /// Store one item and drop the cached menu.
    ///
    /// # Errors
    ///
    /// Returns an error if the item's category does not exist.
    pub async fn upsert_item(&self, item: &MenuItem) -> Result<(), MenuServiceError> {
        self.store.upsert_menu_item(item).await?;
        self.invalidate().await;
        Ok(())
    }

    /// Drop the cached menu.
    pub async fn invalidate(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use taiwanese_house_core::Price;

    use super::*;
    use crate::db::MemoryStore;

    fn rice() -> MenuCategory {
        MenuCategory {
            slug: "rice".to_string(),
            name: "Rice Bowls".to_string(),
            sort_order: 1,
        }
    }

    fn item(id: i32, name: &str, category: &str) -> MenuItem {
        MenuItem {
            id: MenuItemId::new(id),
            name: name.to_string(),
            description: String::new(),
            category: category.to_string(),
            base_price: Price::new(Decimal::new(1290, 2)),
            image_url: None,
            available: true,
            add_ons: Vec::new(),
            removable: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_menu() {
        let service = MenuService::new(Arc::new(MemoryStore::new()));

        let result = service
            .import(&[rice()], &[item(1, "", "rice"), item(2, "Tea", "drinks")], false)
            .await;

        match result {
            Err(MenuServiceError::Invalid(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected invalid menu, got {other:?}"),
        }
        assert!(service.menu().await.unwrap().sections.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_invalidates_cached_menu() {
        let service = MenuService::new(Arc::new(MemoryStore::new()));
        service
            .import(&[rice()], &[item(1, "Lu Rou Fan", "rice")], false)
            .await
            .unwrap();
        assert_eq!(service.menu().await.unwrap().sections[0].items.len(), 1);

        service
            .upsert_item(&item(2, "Chicken Chop Rice", "rice"))
            .await
            .unwrap();
        assert_eq!(service.menu().await.unwrap().sections[0].items.len(), 2);
    }

    #[tokio::test]
    async fn test_item_not_found() {
        let service = MenuService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service.item(MenuItemId::new(404)).await,
            Err(MenuServiceError::NotFound(_))
        ));
    }
}
