//! Load the menu from a YAML file.
//!
//! ```yaml
//! categories:
//!   - slug: rice
//!     name: Rice Bowls
//!     sort_order: 1
//! items:
//!   - id: 1
//!     name: Lu Rou Fan
//!     description: Braised pork belly over rice
//!     category: rice
//!     base_price: "12.90"
//!     available: true
//!     add_ons:
//!       - { id: 10, name: Braised Egg, price: "2.00" }
//!     removable: [scallions]
//! ```
//!
//! The whole file is validated before anything is written.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};

use taiwanese_house_core::menu::{MenuCategory, MenuItem};
use taiwanese_house_server::db::PgStore;
use taiwanese_house_server::services::menu::{MenuService, MenuServiceError};

use super::connect;

/// Top level of a menu file.
#[derive(Debug, Deserialize)]
pub struct MenuFile {
    pub categories: Vec<MenuCategory>,
    pub items: Vec<MenuItem>,
}

/// Parse a menu file's contents.
///
/// # Errors
///
/// Returns the YAML error if the document does not match [`MenuFile`].
pub fn parse_menu(content: &str) -> Result<MenuFile, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Seed the menu from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML menu
/// * `clear` - If true, remove categories and items not in the file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the menu fails
/// validation, or database operations fail.
pub async fn menu(file_path: &str, clear: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading menu from file");

    // Parse before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let file = parse_menu(&content)?;

    info!(
        categories = file.categories.len(),
        items = file.items.len(),
        "Parsed menu"
    );

    let pool = connect().await?;
    let menu = MenuService::new(Arc::new(PgStore::new(pool)));

    match menu.import(&file.categories, &file.items, clear).await {
        Ok(()) => {
            info!(clear, "Menu seeded");
            Ok(())
        }
        Err(MenuServiceError::Invalid(errors)) => {
            error!("Menu validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            Err(format!("{} validation errors found", errors.len()).into())
        }
        Err(e) => Err(e.into()),
    }
}
