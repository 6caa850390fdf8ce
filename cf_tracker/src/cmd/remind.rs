use crate::cmd::build_service;
use anyhow::{Context, Result};
use cf_tracker_libs::Config;
use clap::Args;

#[derive(Debug, Args)]
pub struct RemindArgs {
    /// Override INACTIVITY_DAYS
    #[arg(long)]
    days: Option<i64>,
}

pub async fn run(args: RemindArgs) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(days) = args.days {
        config.reminder.inactivity_days = days;
    }
    let service = build_service(&config).await?;

    let report = service.check_inactivity().await.with_context(|| {
        let message = "inactivity check failed";
        tracing::error!(message);
        message
    })?;
    tracing::info!(
        "{} inactive profiles, {} notified, {} failed",
        report.inactive,
        report.notified,
        report.failed
    );

    Ok(())
}
