//! Taiwanese House ordering API.
//!
//! This binary serves the JSON API used by the mobile app on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - `PostgreSQL` for users, menu, carts and orders when `HOUSE_DATABASE_URL`
//!   is set, otherwise an in-memory store
//! - Cookie sessions via tower-sessions
//! - Verification codes by email (SMTP) or logged when no SMTP is configured

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taiwanese_house_server::config::HouseConfig;
use taiwanese_house_server::db::{self, MemoryStore, PgStore, Store};
use taiwanese_house_server::error::sentry_event_filter;
use taiwanese_house_server::middleware::{create_session_layer, request_id_middleware};
use taiwanese_house_server::routes;
use taiwanese_house_server::services::notify::{EmailNotifier, LogNotifier, Notifier};
use taiwanese_house_server::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &HouseConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (needed for Sentry init)
    let config = HouseConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taiwanese_house_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, "Emailing verification codes via SMTP");
            Arc::new(EmailNotifier::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP not configured, verification codes will only be logged");
            Arc::new(LogNotifier)
        }
    };

    // Only the session table is created here; the `house` schema comes from
    // `cargo run -p taiwanese-house-cli -- migrate`.
    let app = if let Some(database_url) = &config.database_url {
        let pool = db::create_pool(database_url).await?;
        tracing::info!("Database pool created");

        let sessions = PostgresStore::new(pool.clone());
        sessions.migrate().await?;

        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        build_app(AppState::new(config.clone(), store, notifier), sessions)
    } else {
        tracing::warn!("No database configured, using the in-memory store");
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        build_app(
            AppState::new(config.clone(), store, notifier),
            tower_sessions::MemoryStore::default(),
        )
    };

    let addr = config.socket_addr();
    tracing::info!("taiwanese-house listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Peer addresses feed the rate limiter when no proxy header is present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Wrap the API router in the session, request id, tracing and Sentry layers.
fn build_app<S>(state: AppState, sessions: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(sessions, state.config());

    routes::router(state)
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
