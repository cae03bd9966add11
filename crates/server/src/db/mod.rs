//! Storage ports and their adapters.
//!
//! Services talk to storage only through the traits in this module, so any
//! backend can be plugged in:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, schema `house`
//! - [`MemoryStore`] - in-process maps, for tests and database-less dev runs
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p taiwanese-house-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use taiwanese_house_core::account::{Feedback, NewFeedback, ProfileUpdate, UserProfile};
use taiwanese_house_core::cart::{CartItem, CartLine};
use taiwanese_house_core::flow::StoredCode;
use taiwanese_house_core::menu::{MenuCategory, MenuItem};
use taiwanese_house_core::order::{NewOrder, Order};
use taiwanese_house_core::{
    CartItemId, CodePurpose, Coins, Email, MenuItemId, OrderId, PhoneNumber, UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::user::NewUser;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Accounts and loyalty balances.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create an account. Email and phone must both be unused.
    async fn create_user(&self, user: NewUser) -> Result<UserProfile, RepositoryError>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserProfile>, RepositoryError>;

    async fn user_by_email(&self, email: &Email) -> Result<Option<UserProfile>, RepositoryError>;

    async fn user_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<UserProfile>, RepositoryError>;

    /// The argon2 PHC string for a user, if the account exists.
    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    /// Apply a profile edit. A taken email or phone is a `Conflict`.
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, RepositoryError>;

    /// Add `delta` coins (negative to spend) and return the new balance.
    ///
    /// A balance that would go below zero is a `Conflict` and nothing changes.
    async fn adjust_coins(&self, id: UserId, delta: i64) -> Result<Coins, RepositoryError>;

    /// Delete the account together with its cart, orders and feedback.
    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError>;
}

/// The menu.
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn categories(&self) -> Result<Vec<MenuCategory>, RepositoryError>;

    async fn menu_items(&self) -> Result<Vec<MenuItem>, RepositoryError>;

    async fn menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError>;

    async fn upsert_category(&self, category: &MenuCategory) -> Result<(), RepositoryError>;

    /// Insert or replace an item, including its add-ons.
    async fn upsert_menu_item(&self, item: &MenuItem) -> Result<(), RepositoryError>;

    /// Remove every category, item and add-on.
    async fn clear_menu(&self) -> Result<(), RepositoryError>;
}

/// Per-user carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Lines in insertion order.
    async fn cart_items(&self, user: UserId) -> Result<Vec<CartItem>, RepositoryError>;

    /// Add a line, merging into an identically configured one if present.
    async fn add_cart_line(&self, user: UserId, line: CartLine)
    -> Result<CartItem, RepositoryError>;

    async fn set_cart_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError>;

    async fn remove_cart_item(&self, user: UserId, id: CartItemId) -> Result<(), RepositoryError>;

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError>;
}

/// Placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the order and its payment, deduct the redeemed coins, credit the
    /// earned coins and empty the cart, all or nothing.
    ///
    /// Not enough coins is a `Conflict`.
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Newest first.
    async fn orders_for(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    async fn order(&self, user: UserId, id: OrderId) -> Result<Option<Order>, RepositoryError>;
}

/// Customer feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn create_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError>;

    /// Newest first.
    async fn feedback_for(&self, user: UserId) -> Result<Vec<Feedback>, RepositoryError>;
}

/// One-time verification codes, one per destination and purpose.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store a code, replacing any earlier one for the same destination and purpose.
    async fn put_code(&self, code: StoredCode) -> Result<(), RepositoryError>;

    async fn code(
        &self,
        destination: &str,
        purpose: CodePurpose,
    ) -> Result<Option<StoredCode>, RepositoryError>;

    /// Take one attempt against a live code.
    ///
    /// In a single step, counts the attempt and returns the code with the
    /// new count, but only while the code is unexpired at `now` and has fewer
    /// than `max_attempts` attempts. Returns `None` otherwise, leaving the
    /// row untouched.
    async fn claim_attempt(
        &self,
        destination: &str,
        purpose: CodePurpose,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredCode>, RepositoryError>;

    /// Delete the code if its hash is still `code_hash`.
    ///
    /// Returns whether a row was deleted, so only one of several concurrent
    /// correct guesses wins.
    async fn consume_code(
        &self,
        destination: &str,
        purpose: CodePurpose,
        code_hash: &str,
    ) -> Result<bool, RepositoryError>;
}

/// Everything the application needs from storage.
#[async_trait]
pub trait Store:
    UserStore + MenuStore + CartStore + OrderStore + FeedbackStore + CodeStore
{
    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
