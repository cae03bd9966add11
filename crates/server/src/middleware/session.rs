//! Session middleware configuration.
//!
//! Sessions are stored in `PostgreSQL` (tower-sessions-sqlx-store) when a
//! database is configured, otherwise in memory.

use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

use crate::config::HouseConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "th_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer over any session store.
///
/// The cookie is `HttpOnly`, `SameSite=Lax`, and `Secure` when the public
/// base URL is HTTPS. Sessions expire after 7 days of inactivity.
#[must_use]
pub fn create_session_layer<S>(store: S, config: &HouseConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
