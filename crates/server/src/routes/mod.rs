//! HTTP route handlers for the ordering API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                   - Liveness
//! GET    /health/ready             - Store readiness
//!
//! # Auth (strict rate limit)
//! POST   /api/auth/signup          - Create account and sign in
//! POST   /api/auth/login           - Email or phone + password
//! POST   /api/auth/phone/start     - Text a login code
//! POST   /api/auth/phone/verify    - Sign in with the code
//! POST   /api/auth/logout
//! POST   /api/auth/recovery/start  - Send a recovery code
//! POST   /api/auth/recovery/verify - Check the recovery code
//! POST   /api/auth/recovery/reset  - Set the new password
//!
//! # Everything below shares the relaxed API rate limit
//!
//! # Account (requires auth)
//! GET    /api/account
//! PATCH  /api/account
//! POST   /api/account/password
//! DELETE /api/account
//!
//! # Menu
//! GET    /api/menu
//! GET    /api/menu/items/{id}
//!
//! # Cart (requires auth)
//! GET    /api/cart?coins=N
//! DELETE /api/cart
//! POST   /api/cart/items
//! PATCH  /api/cart/items/{id}
//! DELETE /api/cart/items/{id}
//! GET    /api/cart/events          - SSE cart snapshots
//!
//! # Orders (requires auth)
//! POST   /api/checkout
//! GET    /api/orders
//! GET    /api/orders/{id}
//!
//! # Feedback (requires auth)
//! POST   /api/feedback
//! GET    /api/feedback
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod feedback;
pub mod menu;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/phone/start", post(auth::phone_start))
        .route("/phone/verify", post(auth::phone_verify))
        .route("/logout", post(auth::logout))
        .route("/recovery/start", post(auth::recovery_start))
        .route("/recovery/verify", post(auth::recovery_verify))
        .route("/recovery/reset", post(auth::recovery_reset))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(account::show)
                .patch(account::update)
                .delete(account::delete),
        )
        .route("/password", post(account::change_password))
}

/// Create the menu routes router.
pub fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(menu::index))
        .route("/items/{id}", get(menu::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
        .route("/events", get(cart::events))
}

/// Create all API routes.
///
/// The session layer is not applied here; the binary and the integration
/// tests each add their own.
pub fn router(state: AppState) -> Router {
    let mut auth = auth_routes();
    let mut api = Router::new()
        .nest("/account", account_routes())
        .nest("/menu", menu_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::checkout))
        .route("/orders", get(checkout::orders))
        .route("/orders/{id}", get(checkout::order))
        .route("/feedback", get(feedback::index).post(feedback::create));

    if state.config().rate_limit {
        auth = auth.layer(auth_rate_limiter());
        api = api.layer(api_rate_limiter());
    }

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/auth", auth)
        .nest("/api", api)
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
