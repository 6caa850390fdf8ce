mod cmd;
mod modules;

use crate::cmd::{
    catalog::{self, CatalogArgs},
    remind::{self, RemindArgs},
    server::{self, ServerArgs},
    sync::{self, SyncArgs},
    track::{self, TrackArgs},
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{env, str::FromStr};
use tokio::runtime::Builder;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, time::OffsetTime},
};

#[derive(Debug, Parser)]
#[command(name = "cf_tracker")]
#[command(about = "Codeforces profile tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the trigger and status API and run the scheduled jobs
    Server(ServerArgs),
    /// Synchronize one or all tracked profiles
    Sync(SyncArgs),
    /// Refresh the problem catalog
    Catalog(CatalogArgs),
    /// Notify inactive profiles
    Remind(RemindArgs),
    /// Start tracking a handle
    Track(TrackArgs),
}

fn main() -> Result<()> {
    dotenv().ok();

    let log_level = env::var("RUST_LOG").unwrap_or(String::from("info"));
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_str(&log_level)?.into())
        .from_env_lossy();
    let format = fmt::format()
        .with_level(true)
        .with_target(true)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_timer(OffsetTime::local_rfc_3339()?);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(format)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let runtime = Builder::new_multi_thread().enable_all().build()?;

    match Cli::parse().command {
        Commands::Server(args) => runtime.block_on(server::run(args)),
        Commands::Sync(args) => runtime.block_on(sync::run(args)),
        Commands::Catalog(args) => runtime.block_on(catalog::run(args)),
        Commands::Remind(args) => runtime.block_on(remind::run(args)),
        Commands::Track(args) => runtime.block_on(track::run(args)),
    }
}
