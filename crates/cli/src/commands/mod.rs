//! Command implementations.

pub mod coins;
pub mod migrate;
pub mod seed;

use sqlx::PgPool;
use thiserror::Error;

use taiwanese_house_server::config::{ConfigError, HouseConfig};
use taiwanese_house_server::db;

/// Errors shared by all commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No database configured.
    #[error("Missing environment variable: HOUSE_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the configured database.
///
/// # Errors
///
/// Returns an error if no database URL is set or the connection fails.
pub async fn connect() -> Result<PgPool, CommandError> {
    let config = HouseConfig::from_env()?;
    let database_url = config
        .database_url
        .ok_or(CommandError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
