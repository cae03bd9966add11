//! Cart route handlers.
//!
//! Every mutating route returns the updated cart. `GET /api/cart/events`
//! streams the cart as Server-Sent Events so other open clients stay in step.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::instrument;

use taiwanese_house_core::cart::CartSelection;
use taiwanese_house_core::{CartItemId, Coins};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::cart::{CartEvent, CartView};
use crate::state::AppState;

/// Query for `GET /api/cart`.
#[derive(Debug, Default, Deserialize)]
pub struct CartQuery {
    /// Coins the customer wants to redeem; capped by balance and subtotal.
    #[serde(default)]
    pub coins: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// Current cart with its quote.
///
/// GET /api/cart?coins=N
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<CartQuery>,
) -> Result<Json<CartView>> {
    Ok(Json(
        state.cart().view(user.id, Coins::new(query.coins)).await?,
    ))
}

/// Add a menu item with its add-ons and removals.
///
/// POST /api/cart/items
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(selection): Json<CartSelection>,
) -> Result<Json<CartView>> {
    let menu_item_id = selection.menu_item_id.to_string();
    add_breadcrumb(
        "cart",
        "Added item to cart",
        Some(&[("menu_item_id", &menu_item_id)]),
    );

    Ok(Json(state.cart().add(user.id, &selection).await?))
}

/// Set the quantity of a line.
///
/// PATCH /api/cart/items/{id}
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>> {
    Ok(Json(
        state
            .cart()
            .set_quantity(user.id, CartItemId::new(id), body.quantity)
            .await?,
    ))
}

/// Remove a line.
///
/// DELETE /api/cart/items/{id}
#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<CartView>> {
    Ok(Json(
        state.cart().remove(user.id, CartItemId::new(id)).await?,
    ))
}

/// Empty the cart.
///
/// DELETE /api/cart
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    Ok(Json(state.cart().clear(user.id).await?))
}

/// Stream cart snapshots.
///
/// GET /api/cart/events
///
/// Sends the current cart first, then a `snapshot` event after every change
/// made from any session of the same user.
pub async fn events(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>>> {
    let cart = state.cart().clone();
    // Subscribe before reading so no change slips in between.
    let mut receiver = cart.subscribe(user.id);
    let initial = cart.view(user.id, Coins::ZERO).await?;

    let stream = async_stream::stream! {
        yield Ok(snapshot_event(&CartEvent::Snapshot(initial)));

        loop {
            match receiver.recv().await {
                Ok(event) => yield Ok(snapshot_event(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(user_id = %user.id, skipped, "Cart stream lagged, resending");
                    if let Ok(view) = cart.view(user.id, Coins::ZERO).await {
                        yield Ok(snapshot_event(&CartEvent::Snapshot(view)));
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn snapshot_event(event: &CartEvent) -> Event {
    let json = serde_json::to_string(event)
        .unwrap_or_else(|_| r#"{"type":"error","message":"Failed to serialize cart"}"#.to_string());
    Event::default().event("snapshot").data(json)
}
