//! Checkout and order history handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use taiwanese_house_core::order::Order;
use taiwanese_house_core::payment::PaymentDetails;
use taiwanese_house_core::{Coins, OrderId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Checkout body.
///
/// ```json
/// { "coins": 300, "payment": { "method": "card", "number": "4242 4242 4242 4242",
///   "expiry": "12/28", "cvv": "123", "holder": "MEI LIN" } }
/// ```
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Coins to redeem; capped by balance and subtotal.
    #[serde(default)]
    pub coins: u32,
    pub payment: PaymentDetails,
}

/// Place an order for the whole cart.
///
/// POST /api/checkout
///
/// Returns `402 Payment Required` when the simulated payment is declined;
/// the cart and coin balance are left untouched in that case.
#[instrument(skip_all)]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<impl IntoResponse> {
    add_breadcrumb("checkout", "Checkout started", None);

    let order = state
        .checkout()
        .checkout(
            user.id,
            Coins::new(body.coins),
            &body.payment,
            Utc::now().date_naive(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Order history, newest first.
///
/// GET /api/orders
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.checkout().orders(user.id).await?))
}

/// A single order.
///
/// GET /api/orders/{id}
#[instrument(skip_all)]
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    Ok(Json(
        state.checkout().order(user.id, OrderId::new(id)).await?,
    ))
}
