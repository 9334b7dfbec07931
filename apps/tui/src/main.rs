//! cardpick TUI: check cards off a picklist while walking the pick path.
//!
//! Loads a picklist JSON written by `cardpick run`, tracks what has been
//! grabbed, and fetches prices and images on a background worker, built
//! with `ratatui` + `crossterm`.

mod app;
mod screens;
mod session;
mod widgets;
mod worker;

use std::path::{Path, PathBuf};

use cardpick_catalog::{LookupCache, LookupChain, LookupStrategy, ScryfallClient};
use cardpick_shared::{CatalogConfig, load_config};
use clap::Parser;
use color_eyre::eyre::{Result, eyre};

use session::Session;
use worker::LookupHandle;

#[derive(Parser)]
#[command(
    name = "cardpick-tui",
    version,
    about = "Check off picklist items while picking.",
    long_about = None,
)]
struct Cli {
    /// Picklist JSON. Defaults to the newest one in the output directory.
    picklist: Option<PathBuf>,

    /// Progress snapshot file. Defaults to `<picklist>.progress.json`.
    #[arg(long)]
    progress: Option<PathBuf>,

    /// Do not look up prices or images.
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = load_config()?;

    let path = match cli.picklist {
        Some(path) => path,
        None => {
            let dir = Path::new(&config.defaults.output_dir);
            session::latest_picklist(dir)?.ok_or_else(|| {
                eyre!(
                    "no picklist found in {}; run `cardpick run` first",
                    dir.display()
                )
            })?
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let mut session = Session::open(&path, cli.progress)?;

    if !cli.offline {
        let client = ScryfallClient::new(&CatalogConfig::from(&config))?;
        let chain = LookupChain::default().with(LookupStrategy::NameInSet);
        session.attach(LookupHandle::spawn(
            runtime.handle(),
            LookupCache::new(client, chain),
        ));
    }

    app::run(session)
}
