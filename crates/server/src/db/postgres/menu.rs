//! Menu categories, items and add-ons.

use std::collections::HashMap;

use async_trait::async_trait;

use taiwanese_house_core::menu::{AddOn, MenuCategory, MenuItem};
use taiwanese_house_core::{AddOnId, MenuItemId, Price};

use super::PgStore;
use crate::db::{MenuStore, RepositoryError};

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    slug: String,
    name: String,
    sort_order: i32,
}

impl From<CategoryRow> for MenuCategory {
    fn from(row: CategoryRow) -> Self {
        Self {
            slug: row.slug,
            name: row.name,
            sort_order: row.sort_order,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MenuItemRow {
    id: i32,
    name: String,
    description: String,
    category: String,
    base_price: Price,
    image_url: Option<String>,
    available: bool,
    removable: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct AddOnRow {
    id: i32,
    menu_item_id: i32,
    name: String,
    price: Price,
}

impl MenuItemRow {
    fn into_item(self, add_ons: Vec<AddOn>) -> MenuItem {
        MenuItem {
            id: MenuItemId::new(self.id),
            name: self.name,
            description: self.description,
            category: self.category,
            base_price: self.base_price,
            image_url: self.image_url,
            available: self.available,
            add_ons,
            removable: self.removable,
        }
    }
}

fn group_add_ons(rows: Vec<AddOnRow>) -> HashMap<i32, Vec<AddOn>> {
    let mut grouped: HashMap<i32, Vec<AddOn>> = HashMap::new();
    for row in rows {
        grouped.entry(row.menu_item_id).or_default().push(AddOn {
            id: AddOnId::new(row.id),
            name: row.name,
            price: row.price,
        });
    }
    grouped
}

#[async_trait]
impl MenuStore for PgStore {
    async fn categories(&self) -> Result<Vec<MenuCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT slug, name, sort_order FROM house.category ORDER BY sort_order, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn menu_items(&self) -> Result<Vec<MenuItem>, RepositoryError> {
        let items = sqlx::query_as::<_, MenuItemRow>(
            r"
            SELECT id, name, description, category, base_price, image_url, available, removable
            FROM house.menu_item
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let add_ons = sqlx::query_as::<_, AddOnRow>(
            "SELECT id, menu_item_id, name, price FROM house.add_on ORDER BY menu_item_id, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut add_ons = group_add_ons(add_ons);
        Ok(items
            .into_iter()
            .map(|row| {
                let extras = add_ons.remove(&row.id).unwrap_or_default();
                row.into_item(extras)
            })
            .collect())
    }

    async fn menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, MenuItemRow>(
            r"
            SELECT id, name, description, category, base_price, image_url, available, removable
            FROM house.menu_item
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let add_ons = sqlx::query_as::<_, AddOnRow>(
            "SELECT id, menu_item_id, name, price FROM house.add_on WHERE menu_item_id = $1 ORDER BY id",
        )
        .bind(id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        let add_ons = group_add_ons(add_ons).remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_item(add_ons)))
    }

    async fn upsert_category(&self, category: &MenuCategory) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO house.category (slug, name, sort_order)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE SET name = $2, sort_order = $3
            ",
        )
        .bind(&category.slug)
        .bind(&category.name)
        .bind(category.sort_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_menu_item(&self, item: &MenuItem) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO house.menu_item
                (id, name, description, category, base_price, image_url, available, removable)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = $2, description = $3, category = $4, base_price = $5,
                image_url = $6, available = $7, removable = $8
            ",
        )
        .bind(item.id.as_i32())
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(item.base_price)
        .bind(item.image_url.as_deref())
        .bind(item.available)
        .bind(&item.removable)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict(format!("unknown category '{}'", item.category));
            }
            RepositoryError::Database(e)
        })?;

        sqlx::query("DELETE FROM house.add_on WHERE menu_item_id = $1")
            .bind(item.id.as_i32())
            .execute(&mut *tx)
            .await?;

        for add_on in &item.add_ons {
            sqlx::query(
                "INSERT INTO house.add_on (id, menu_item_id, name, price) VALUES ($1, $2, $3, $4)",
            )
            .bind(add_on.id.as_i32())
            .bind(item.id.as_i32())
            .bind(&add_on.name)
            .bind(add_on.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_menu(&self) -> Result<(), RepositoryError> {
        // Items and add-ons cascade from categories.
        sqlx::query("DELETE FROM house.category")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
