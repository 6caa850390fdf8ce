use crate::cmd::build_service;
use anyhow::{Context, Result};
use cf_tracker_libs::Config;
use clap::Args;

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Delete catalog entries with gym or malformed keys before updating
    #[arg(long)]
    cleanup: bool,
}

pub async fn run(args: CatalogArgs) -> Result<()> {
    let config = Config::from_env();
    let service = build_service(&config).await?;

    if args.cleanup {
        service.cleanup_catalog().await.with_context(|| {
            let message = "failed to clean up the problem catalog";
            tracing::error!(message);
            message
        })?;
    }

    let report = service.update_catalog().await.with_context(|| {
        let message = "failed to update the problem catalog";
        tracing::error!(message);
        message
    })?;
    tracing::info!("{}", serde_json::to_string(&report)?);

    Ok(())
}
