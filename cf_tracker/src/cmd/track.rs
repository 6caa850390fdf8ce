use crate::cmd::build_service;
use anyhow::{Context, Result};
use cf_tracker_libs::Config;
use clap::Args;

#[derive(Debug, Args)]
pub struct TrackArgs {
    handle: String,
    /// Display name, defaults to the handle
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// Synchronize the profile right after registering it
    #[arg(long)]
    sync: bool,
}

pub async fn run(args: TrackArgs) -> Result<()> {
    let config = Config::from_env();
    let service = build_service(&config).await?;

    let name = args.name.unwrap_or_else(|| args.handle.clone());
    service
        .track(&args.handle, &name, args.email)
        .await
        .with_context(|| {
            let message = format!("failed to register {}", args.handle);
            tracing::error!(message);
            message
        })?;

    if args.sync {
        service.sync_profile(&args.handle).await.with_context(|| {
            let message = format!("failed to synchronize {}", args.handle);
            tracing::error!(message);
            message
        })?;
    }

    Ok(())
}
