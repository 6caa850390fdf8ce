use crate::cmd::build_service;
use anyhow::{Context, Result};
use cf_tracker_libs::Config;
use clap::Args;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Synchronize only this handle
    #[arg(long)]
    handle: Option<String>,
    /// Skip refreshing the contest list
    #[arg(long)]
    skip_contests: bool,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let config = Config::from_env();
    let service = build_service(&config).await?;

    let contests = if args.skip_contests {
        Ok(0)
    } else {
        service.sync_contests().await.map_err(|e| {
            tracing::error!("failed to synchronize the contest list: {}", e);
            e
        })
    };

    match args.handle {
        Some(handle) => {
            let outcome = service.sync_profile(&handle).await.with_context(|| {
                let message = format!("failed to synchronize {}", handle);
                tracing::error!(message);
                message
            })?;
            for warning in outcome.warnings.iter() {
                tracing::warn!("{}", warning);
            }
        }
        None => {
            let summary = service.sync_all_profiles().await.with_context(|| {
                let message = "failed to load tracked profiles";
                tracing::error!(message);
                message
            })?;
            if summary.failed > 0 {
                tracing::warn!(
                    "{} of {} profiles failed to synchronize",
                    summary.failed,
                    summary.succeeded + summary.failed
                );
            }
        }
    }

    contests.context("contest list was not synchronized")?;
    Ok(())
}
