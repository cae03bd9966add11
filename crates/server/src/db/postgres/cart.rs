//! Per-user cart lines.

use async_trait::async_trait;
use sqlx::types::Json;

use taiwanese_house_core::cart::{CartItem, CartLine, ChosenAddOn, merged_quantity};
use taiwanese_house_core::{CartItemId, MenuItemId, Price, UserId};

use super::{PgStore, quantity_from_db, quantity_to_db};
use crate::db::{CartStore, RepositoryError};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    menu_item_id: i32,
    name: String,
    base_price: Price,
    quantity: i32,
    add_ons: Json<Vec<ChosenAddOn>>,
    removals: Vec<String>,
    note: Option<String>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CartItemId::new(row.id),
            line: CartLine {
                menu_item_id: MenuItemId::new(row.menu_item_id),
                name: row.name,
                base_price: row.base_price,
                quantity: quantity_from_db(row.quantity)?,
                add_ons: row.add_ons.0,
                removals: row.removals,
                note: row.note,
            },
        })
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_items(&self, user: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, menu_item_id, name, base_price, quantity, add_ons, removals, note
            FROM house.cart_item
            WHERE user_id = $1
            ORDER BY id
            ",
        )
        .bind(user.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn add_cart_line(
        &self,
        user: UserId,
        line: CartLine,
    ) -> Result<CartItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock candidate lines so concurrent adds of the same dish merge.
        let candidates = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, menu_item_id, name, base_price, quantity, add_ons, removals, note
            FROM house.cart_item
            WHERE user_id = $1 AND menu_item_id = $2
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(user.as_i32())
        .bind(line.menu_item_id.as_i32())
        .fetch_all(&mut *tx)
        .await?;

        let mut existing = None;
        for row in candidates {
            let item = CartItem::try_from(row)?;
            if item.line.same_configuration(&line) {
                existing = Some(item);
                break;
            }
        }

        let row = if let Some(item) = existing {
            let quantity = merged_quantity(item.line.quantity, line.quantity);
            sqlx::query_as::<_, CartItemRow>(
                r"
                UPDATE house.cart_item SET quantity = $2
                WHERE id = $1
                RETURNING id, menu_item_id, name, base_price, quantity, add_ons, removals, note
                ",
            )
            .bind(item.id.as_i32())
            .bind(quantity_to_db(quantity)?)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, CartItemRow>(
                r"
                INSERT INTO house.cart_item
                    (user_id, menu_item_id, name, base_price, quantity, add_ons, removals, note)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id, menu_item_id, name, base_price, quantity, add_ons, removals, note
                ",
            )
            .bind(user.as_i32())
            .bind(line.menu_item_id.as_i32())
            .bind(&line.name)
            .bind(line.base_price)
            .bind(quantity_to_db(line.quantity)?)
            .bind(Json(&line.add_ons))
            .bind(&line.removals)
            .bind(line.note.as_deref())
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;
        row.try_into()
    }

    async fn set_cart_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            UPDATE house.cart_item SET quantity = $3
            WHERE id = $1 AND user_id = $2
            RETURNING id, menu_item_id, name, base_price, quantity, add_ons, removals, note
            ",
        )
        .bind(id.as_i32())
        .bind(user.as_i32())
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn remove_cart_item(&self, user: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM house.cart_item WHERE id = $1 AND user_id = $2")
            .bind(id.as_i32())
            .bind(user.as_i32())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM house.cart_item WHERE user_id = $1")
            .bind(user.as_i32())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
