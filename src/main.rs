//! Itlend - IT equipment lending core
//!
//! Connects to the database, brings the schema up to date and reports the
//! state of the lending pipeline.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use itlend::{config::AppConfig, repository::Repository, store::SystemClock, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("itlend={},sqlx=warn", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Itlend v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let store = Repository::new(pool.clone()).into_store(Arc::new(SystemClock));
    let state = AppState::new(config, store);

    let pending = state.services.requests.list_pending().await?;
    let active = state.services.loans.active_loans().await?;
    let awaiting_wipe = state.services.devices.awaiting_wipe().await?;

    tracing::info!(
        "{} pending requests, {} active loans, {} devices awaiting wipe",
        pending.len(),
        active.len(),
        awaiting_wipe.len()
    );
    for device in &awaiting_wipe {
        tracing::info!("Device {} returned and not yet wiped", device.id);
    }

    pool.close().await;
    Ok(())
}
