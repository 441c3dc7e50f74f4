use anyhow::Context;
use clap::Parser;
use station_store::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).await.context("station-store failed")
}
