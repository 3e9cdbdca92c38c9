//! doorward: unattended entry-point authorization daemon
//!
//! Listens to a credential scanner, answers admit/deny from a local
//! cache with remote-store fallback, and keeps an audit trail of every
//! decision.

mod app;
mod audit;
mod config;
mod notify;
mod reader;
mod remote;
mod resync;
mod telemetry;

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "doorward", version, about = "Unattended entry-point authorization daemon")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "doorward.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    app::run(config).await
}
