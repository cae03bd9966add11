//! Orders and their payments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use taiwanese_house_core::cart::CartLine;
use taiwanese_house_core::order::{NewOrder, Order, Payment};
use taiwanese_house_core::payment::{CardSummary, EWalletProvider};
use taiwanese_house_core::pricing::PriceQuote;
use taiwanese_house_core::{
    CartItemId, OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus, Price, UserId,
};

use super::{PgStore, coins_from_db};
use crate::db::{OrderStore, RepositoryError};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    lines: Json<Vec<CartLine>>,
    subtotal: Price,
    coins_applied: i64,
    discount: Price,
    total: Price,
    coins_earned: i64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    payment_id: i32,
    method: PaymentMethod,
    payment_status: PaymentStatus,
    amount: Price,
    card: Option<Json<CardSummary>>,
    provider: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let provider = row
            .provider
            .as_deref()
            .map(str::parse::<EWalletProvider>)
            .transpose()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            lines: row.lines.0,
            quote: PriceQuote {
                subtotal: row.subtotal,
                coins_applied: coins_from_db(row.coins_applied)?,
                discount: row.discount,
                total: row.total,
                coins_earned: coins_from_db(row.coins_earned)?,
            },
            status: row.status,
            payment: Payment {
                id: PaymentId::new(row.payment_id),
                method: row.method,
                status: row.payment_status,
                amount: row.amount,
                card: row.card.map(|c| c.0),
                provider,
            },
            created_at: row.created_at,
        })
    }
}

const ORDER_SELECT: &str = r"
    SELECT o.id, o.user_id, o.lines, o.subtotal, o.coins_applied, o.discount, o.total,
           o.coins_earned, o.status, o.created_at,
           p.id AS payment_id, p.method, p.status AS payment_status, p.amount, p.card, p.provider
    FROM house.order o
    JOIN house.payment p ON p.order_id = o.id
";

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let applied = i64::from(order.quote.coins_applied.count());
        let earned = i64::from(order.quote.coins_earned.count());

        let mut tx = self.pool.begin().await?;

        let balance = sqlx::query_scalar::<_, i64>(
            r"
            UPDATE house.user
            SET coins = coins - $2 + $3, updated_at = NOW()
            WHERE id = $1 AND coins >= $2
            RETURNING coins
            ",
        )
        .bind(order.user_id.as_i32())
        .bind(applied)
        .bind(earned)
        .fetch_optional(&mut *tx)
        .await?;

        if balance.is_none() {
            tx.rollback().await?;
            return Err(if self.user_exists(order.user_id).await? {
                RepositoryError::Conflict("insufficient coins".to_owned())
            } else {
                RepositoryError::NotFound
            });
        }

        let (order_id, created_at) = sqlx::query_as::<_, (i32, DateTime<Utc>)>(
            r"
            INSERT INTO house.order
                (user_id, lines, subtotal, coins_applied, discount, total, coins_earned)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            ",
        )
        .bind(order.user_id.as_i32())
        .bind(Json(&order.lines))
        .bind(order.quote.subtotal)
        .bind(applied)
        .bind(order.quote.discount)
        .bind(order.quote.total)
        .bind(earned)
        .fetch_one(&mut *tx)
        .await?;

        let payment_id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO house.payment (order_id, method, status, amount, card, provider)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(order_id)
        .bind(order.payment.method)
        .bind(order.payment_status)
        .bind(order.quote.total)
        .bind(order.payment.card.as_ref().map(Json))
        .bind(order.payment.provider.map(EWalletProvider::as_str))
        .fetch_one(&mut *tx)
        .await?;

        let cart_ids: Vec<i32> = order.cart_item_ids.iter().map(CartItemId::as_i32).collect();
        sqlx::query("DELETE FROM house.cart_item WHERE user_id = $1 AND id = ANY($2)")
            .bind(order.user_id.as_i32())
            .bind(&cart_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Order {
            id: OrderId::new(order_id),
            user_id: order.user_id,
            lines: order.lines,
            quote: order.quote,
            status: OrderStatus::Placed,
            payment: Payment {
                id: PaymentId::new(payment_id),
                method: order.payment.method,
                status: order.payment_status,
                amount: order.quote.total,
                card: order.payment.card,
                provider: order.payment.provider,
            },
            created_at,
        })
    }

    async fn orders_for(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("{ORDER_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user.as_i32())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn order(&self, user: UserId, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("{ORDER_SELECT} WHERE o.id = $1 AND o.user_id = $2");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_i32())
            .bind(user.as_i32())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}
