mod analysis;
mod auth;
mod cache;
mod cli;
mod duration;
mod error;
mod models;
mod providers;
mod report;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting CI Retro - historical CI run analysis");
    cli.execute().await?;

    Ok(())
}
