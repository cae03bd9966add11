//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses are JSON: `{ "error": "message" }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sentry::integrations::tracing::EventFilter;
use serde_json::json;
use thiserror::Error;

use taiwanese_house_core::account::ValidationError;
use taiwanese_house_core::cart::CartError;
use taiwanese_house_core::flow::FlowError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartServiceError;
use crate::services::checkout::CheckoutError;
use crate::services::menu::MenuServiceError;
use crate::services::notify::CODE_LOG_TARGET;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartServiceError),

    /// Checkout or order lookup failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Menu lookup failed.
    #[error("Menu error: {0}")]
    Menu(#[from] MenuServiceError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Input broke a validation rule.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rejected by a rate limiter.
    #[error("Rate limited")]
    RateLimited,

    /// Failure outside the services, such as a rate limiter that cannot
    /// find the client address.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "Internal server error";

impl AppError {
    /// Status code and client-safe message.
    fn classify(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository(err),
            Self::Auth(err) => auth(err),
            Self::Cart(err) => cart(err),
            Self::Checkout(err) => checkout(err),
            Self::Menu(err) => menu(err),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please slow down".to_string(),
            ),
            Self::Session(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
        }
    }
}

fn repository(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn flow(err: &FlowError) -> (StatusCode, String) {
    let status = match err {
        FlowError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        FlowError::OutOfOrder => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

fn auth(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::InvalidPhone(_) => (StatusCode::BAD_REQUEST, "Invalid phone number".to_string()),
        AuthError::InvalidIdentifier(_) => (
            StatusCode::BAD_REQUEST,
            "Enter a valid email address or phone number".to_string(),
        ),
        AuthError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "Account not found".to_string()),
        AuthError::UserAlreadyExists => (
            StatusCode::CONFLICT,
            "An account with this email or phone number already exists".to_string(),
        ),
        AuthError::Flow(e) => flow(e),
        AuthError::Notify(_) => (
            StatusCode::BAD_GATEWAY,
            "Could not send verification code".to_string(),
        ),
        AuthError::Repository(e) => repository(e),
        AuthError::PasswordHash => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
    }
}

fn cart(err: &CartServiceError) -> (StatusCode, String) {
    match err {
        CartServiceError::Cart(e @ (CartError::UnknownItem(_) | CartError::LineNotFound(_))) => {
            (StatusCode::NOT_FOUND, e.to_string())
        }
        CartServiceError::Cart(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        CartServiceError::UserNotFound => (
            StatusCode::UNAUTHORIZED,
            "Please sign in again".to_string(),
        ),
        CartServiceError::Repository(e) => repository(e),
        CartServiceError::Menu(e) => menu(e),
    }
}

fn checkout(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyCart | CheckoutError::Payment(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::PaymentDeclined => (
            StatusCode::PAYMENT_REQUIRED,
            "Payment was declined".to_string(),
        ),
        CheckoutError::InsufficientCoins => (
            StatusCode::CONFLICT,
            "Your coin balance changed, please review your cart".to_string(),
        ),
        CheckoutError::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
        CheckoutError::UserNotFound => (
            StatusCode::UNAUTHORIZED,
            "Please sign in again".to_string(),
        ),
        CheckoutError::Repository(e) => repository(e),
    }
}

fn menu(err: &MenuServiceError) -> (StatusCode, String) {
    match err {
        MenuServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Menu item not found".to_string()),
        MenuServiceError::Invalid(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        MenuServiceError::Repository(e) => repository(e),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.classify();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Decide what the Sentry tracing layer does with an event.
///
/// Errors and warnings become events, info and debug become breadcrumbs.
/// Logged verification codes are never sent.
pub fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> EventFilter {
    sentry_filter(*metadata.level(), metadata.target())
}

fn sentry_filter(level: tracing::Level, target: &str) -> EventFilter {
    if target == CODE_LOG_TARGET {
        return EventFilter::Ignore;
    }
    match level {
        tracing::Level::ERROR | tracing::Level::WARN => EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => EventFilter::Breadcrumb,
        tracing::Level::TRACE => EventFilter::Ignore,
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
