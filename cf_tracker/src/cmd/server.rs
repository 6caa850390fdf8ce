use crate::cmd::build_service;
use crate::modules::handlers::{
    force_sync, liveness, rating_progression, reminder_count, sync_status, trigger_sync,
    update_schedule,
};
use anyhow::{Context, Result};
use axum::{extract::Extension, routing, Router, Server};
use cf_tracker_libs::{Config, SyncService};
use clap::Args;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[arg(long)]
    port: Option<u16>,
}

pub async fn run(args: ServerArgs) -> Result<()> {
    let config = Config::from_env();
    let service = build_service(&config).await?;

    service.start_scheduler().await.with_context(|| {
        let message = "couldn't start scheduled jobs. check SYNC_CRON, INACTIVITY_CRON and CATALOG_CRON.";
        tracing::error!(message);
        message
    })?;

    let app = create_router(service.clone());
    let port = match args.port {
        Some(port) => port,
        None => {
            tracing::warn!("API server will be launched at default port number 8000");
            8000u16
        }
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server start at port {}", port);
    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| {
            let message = format!("server at port {} stopped unexpectedly", port);
            tracing::error!(message);
            message
        })?;

    service.stop_scheduler().await;
    Ok(())
}

pub fn create_router(service: Arc<SyncService>) -> Router {
    Router::new()
        .route("/api/sync/status", routing::get(sync_status))
        .route("/api/sync/schedule", routing::post(update_schedule))
        .route("/api/sync/trigger", routing::post(trigger_sync))
        .route("/api/sync/force", routing::post(force_sync))
        .route(
            "/api/profiles/:handle/rating-progression",
            routing::get(rating_progression),
        )
        .route("/api/profiles/:handle/reminders", routing::get(reminder_count))
        .route("/api/liveness", routing::get(liveness))
        .layer(Extension(service))
        .layer(CorsLayer::permissive())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("SIGINT signal received, starting graceful shutdown.");
}
