pub mod catalog;
pub mod remind;
pub mod server;
pub mod sync;
pub mod track;

use anyhow::{Context, Result};
use cf_tracker_libs::{reminder::LogNotifier, Config, PgStore, RateLimitedClient, SyncService};
use std::sync::Arc;

/// Connect to the database, run migrations and wire the engine.
pub async fn build_service(config: &Config) -> Result<Arc<SyncService>> {
    let database_url = config.database_url.as_deref().with_context(|| {
        let message = "DATABASE_URL must be configured.";
        tracing::error!(message);
        message
    })?;

    let store = PgStore::connect(database_url).await.with_context(|| {
        let message = "Failed to create database connection pool.";
        tracing::error!(message);
        message
    })?;
    store.migrate().await.with_context(|| {
        let message = "Failed to run database migrations.";
        tracing::error!(message);
        message
    })?;

    let client = RateLimitedClient::from_config(&config.client).with_context(|| {
        let message = format!("couldn't create upstream client for {}", config.client.base_url);
        tracing::error!(message);
        message
    })?;

    Ok(SyncService::new(
        Arc::new(client),
        Arc::new(store),
        Arc::new(LogNotifier),
        config,
    ))
}
