//! `PostgreSQL` adapter.
//!
//! Queries are runtime-checked (`query_as::<_, Row>`) against the `house`
//! schema; row structs convert into core types via `TryFrom`, reporting bad
//! stored data as `RepositoryError::DataCorruption`.

mod cart;
mod codes;
mod feedback;
mod menu;
mod orders;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;

use taiwanese_house_core::Coins;

use super::{RepositoryError, Store};

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool (shared with the session store).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn coins_from_db(value: i64) -> Result<Coins, RepositoryError> {
    u32::try_from(value)
        .map(Coins::new)
        .map_err(|_| RepositoryError::DataCorruption(format!("invalid coin count: {value}")))
}

fn quantity_from_db(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("invalid quantity: {value}")))
}

fn quantity_to_db(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::Conflict(format!("quantity {value} out of range")))
}
