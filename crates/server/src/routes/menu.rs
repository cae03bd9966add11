//! Menu route handlers. Public, no sign-in needed.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use taiwanese_house_core::MenuItemId;
use taiwanese_house_core::menu::{Menu, MenuItem};

use crate::error::Result;
use crate::state::AppState;

/// Categories with their items.
///
/// GET /api/menu
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>) -> Result<Json<Menu>> {
    let menu = state.menu().menu().await?;
    Ok(Json(Menu::clone(&menu)))
}

/// A single menu item with its add-ons.
///
/// GET /api/menu/items/{id}
#[instrument(skip_all, fields(menu_item_id = id))]
pub async fn show(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<MenuItem>> {
    Ok(Json(state.menu().item(MenuItemId::new(id)).await?))
}
