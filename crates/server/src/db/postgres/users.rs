//! Accounts and coin balances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use taiwanese_house_core::account::{DisplayName, ProfileUpdate, UserProfile};
use taiwanese_house_core::{Coins, Email, PhoneNumber, UserId};

use super::{PgStore, coins_from_db};
use crate::db::{RepositoryError, UserStore, conflict_on_unique};
use crate::models::user::NewUser;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    phone: String,
    coins: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let name = DisplayName::parse(&row.name).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid name in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let phone = PhoneNumber::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name,
            email,
            phone,
            coins: coins_from_db(row.coins)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// UserStore
// =============================================================================

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<UserProfile, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO house.user (name, email, phone, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, phone, coins, created_at, updated_at
            ",
        )
        .bind(user.name.as_str())
        .bind(user.email.as_str())
        .bind(user.phone.as_str())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email or phone"))?;

        row.try_into()
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, phone, coins, created_at, updated_at
            FROM house.user
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, phone, coins, created_at, updated_at
            FROM house.user
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn user_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, phone, coins, created_at, updated_at
            FROM house.user
            WHERE phone = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM house.user WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE house.user SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i32())
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE house.user
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, phone, coins, created_at, updated_at
            ",
        )
        .bind(id.as_i32())
        .bind(update.name.as_ref().map(DisplayName::as_str))
        .bind(update.email.as_ref().map(Email::as_str))
        .bind(update.phone.as_ref().map(PhoneNumber::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email or phone"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn adjust_coins(&self, id: UserId, delta: i64) -> Result<Coins, RepositoryError> {
        let balance = sqlx::query_scalar::<_, i64>(
            r"
            UPDATE house.user
            SET coins = coins + $2, updated_at = NOW()
            WHERE id = $1 AND coins + $2 >= 0
            RETURNING coins
            ",
        )
        .bind(id.as_i32())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match balance {
            Some(coins) => coins_from_db(coins),
            None if self.user_exists(id).await? => {
                Err(RepositoryError::Conflict("insufficient coins".to_owned()))
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        // Cart lines, orders, payments and feedback cascade.
        let result = sqlx::query("DELETE FROM house.user WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl PgStore {
    pub(super) async fn user_exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM house.user WHERE id = $1)",
        )
        .bind(id.as_i32())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
