//! cardpick CLI: turn marketplace orders into a pick-path ordered picklist.
//!
//! Fetches seller orders, assigns every card a storage location, looks up
//! images and prices, and writes CSV + JSON picklists for the operator TUI.

mod commands;
mod fulfill;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
