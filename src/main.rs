//! Salon booking bot
//!
//! A Telegram bot that lets visitors book studio services and lets staff
//! manage the catalog, driven by a per-user conversation state machine.

mod api;
mod config;
mod db;
mod labels;
mod messenger;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use messenger::{LoggingMessenger, TelegramMessenger};
use runtime::{BotRuntime, InMemorySessionStore, ProductionRuntime, RuntimeSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salon_bot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env()?;
    config.warn_missing();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Initialize database
    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    let messenger = LoggingMessenger::new(TelegramMessenger::new(
        &config.bot_token,
        &config.api_base,
    )?);
    let sessions = Arc::new(InMemorySessionStore::new(config.session_ttl));

    let runtime: Arc<ProductionRuntime> = Arc::new(BotRuntime::new(
        db.clone(),
        db,
        messenger,
        sessions,
        RuntimeSettings {
            staff: config.admin_ids.clone(),
            contacts: Arc::new(config.contacts.clone()),
            report_window_days: config.report_window_days,
        },
    ));
    runtime.spawn_sweeper(SWEEP_INTERVAL);

    tracing::info!(
        staff = config.admin_ids.len(),
        session_ttl_secs = config.session_ttl.as_secs(),
        "Runtime initialized"
    );

    let state = AppState::new(runtime, config.webhook_secret.clone());
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Salon bot listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
