//! CLI command definitions, routing, and tracing setup.

use std::io::IsTerminal;
use std::path::PathBuf;

use cardpick_catalog::{LookupCache, LookupChain, ScryfallClient};
use cardpick_core::assembler::AssembleOptions;
use cardpick_core::export;
use cardpick_core::locations::{
    AutoAssign, LocationDecision, LocationPolicy, LocationResolver, PromptOperator, RejectUnknown,
};
use cardpick_core::pipeline::{PicklistOutcome, PicklistRequest, ProgressReporter, build_picklist};
use cardpick_marketplace::HttpOrderClient;
use cardpick_shared::{
    AppConfig, CatalogConfig, OrderFilter, RetrieveConfig, init_config, load_config,
    marketplace_credentials,
};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::fulfill::{self, FulfillArgs};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// cardpick: marketplace orders to a physical pick path.
#[derive(Parser)]
#[command(
    name = "cardpick",
    version,
    about = "Build pick-path ordered picklists from marketplace orders.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch orders and write a picklist.
    Run(RunArgs),

    /// Mark open orders as processing or shipped.
    Fulfill(FulfillArgs),

    /// Inspect or edit set → location assignments.
    Locations {
        #[command(subcommand)]
        action: LocationsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Which orders to include: unshipped, shipped, all, or recent:N.
    #[arg(short, long)]
    pub filter: Option<OrderFilter>,

    /// Only the N most recent orders, regardless of status.
    #[arg(long, conflicts_with = "filter")]
    pub recent: Option<usize>,

    /// Assign unknown sets to LABEL (or the default label) without prompting.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub auto_assign: Option<String>,

    /// Skip image lookups entirely.
    #[arg(long)]
    pub no_images: bool,

    /// Download images into the local image cache.
    #[arg(long, conflicts_with = "no_images")]
    pub download_images: bool,

    /// Look up a market price for every card.
    #[arg(long)]
    pub prices: bool,

    /// Output directory (defaults to `defaults.output_dir`).
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Location mapping subcommands.
#[derive(Subcommand)]
pub(crate) enum LocationsAction {
    /// Print every assignment.
    List,
    /// Assign a set to a location.
    Set {
        /// Set code, e.g. MH2.
        set: String,
        /// Location label, e.g. "Binder 3".
        label: String,
    },
    /// Remove a set's assignment.
    Remove {
        /// Set code.
        set: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "cardpick=info",
        1 => "cardpick=debug",
        _ => "cardpick=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Fulfill(args) => fulfill::cmd_fulfill(args).await,
        Command::Locations { action } => cmd_locations(action),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn resolve_filter(args: &RunArgs, config: &AppConfig) -> Result<RetrieveConfig> {
    let mut retrieve = RetrieveConfig::try_from(config)?;
    if let Some(filter) = args.filter {
        retrieve.filter = filter;
    }
    match args.recent {
        Some(0) => return Err(eyre!("--recent must be at least 1")),
        Some(n) => retrieve.filter = OrderFilter::MostRecent(n),
        None => {}
    }
    Ok(retrieve)
}

fn location_policy(
    args: &RunArgs,
    config: &AppConfig,
    spinner: &ProgressBar,
) -> Box<dyn LocationPolicy> {
    let auto_label = match args.auto_assign.as_deref() {
        Some("") => Some(config.locations.default_label.clone()),
        Some(label) => Some(label.to_string()),
        None if config.locations.auto_assign => Some(config.locations.default_label.clone()),
        None => None,
    };

    match auto_label {
        Some(label) => Box::new(AutoAssign { label }),
        None if std::io::stdin().is_terminal() => Box::new(SpinnerPrompt {
            spinner: spinner.clone(),
        }),
        None => {
            info!("stdin is not a terminal, unknown sets stay unassigned");
            Box::new(RejectUnknown)
        }
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config()?;
    // Credentials are checked before any network call
    let credentials = marketplace_credentials(&config)?;
    let retrieve = resolve_filter(&args, &config)?;

    let orders = HttpOrderClient::from_config(&config, &credentials)?;
    let catalog = ScryfallClient::new(&CatalogConfig::from(&config))?;
    let chain = LookupChain::from_names(&config.catalog.strategies)?;

    let download = !args.no_images && (args.download_images || config.defaults.download_images);
    let mut lookups = LookupCache::new(catalog, chain);
    if download {
        lookups = lookups.with_image_store(
            &config.cache.image_cache_file,
            &config.cache.images_dir,
        );
    }

    let options = AssembleOptions {
        images: !args.no_images,
        prices: args.prices || config.defaults.fetch_prices,
    };
    let output_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));

    info!(
        filter = %retrieve.filter,
        images = options.images,
        download,
        prices = options.prices,
        "building picklist"
    );

    let reporter = CliProgress::new();
    let policy = location_policy(&args, &config, &reporter.spinner);
    let mut locations = LocationResolver::open(
        &config.locations.file,
        policy,
        config.locations.default_label.clone(),
    );

    let request = PicklistRequest {
        retrieve,
        options,
        output_dir,
    };
    let outcome = build_picklist(&request, &orders, &mut locations, &mut lookups, &reporter).await?;

    print_summary(&outcome, config.defaults.high_value_threshold);
    Ok(())
}

fn print_summary(outcome: &PicklistOutcome, threshold: f64) {
    println!();
    match &outcome.paths {
        Some(paths) => {
            println!("  Picklist written!");
            println!("  Orders: {}", outcome.orders_processed);
            println!("  Items:  {}", outcome.items().len());
            println!("  CSV:    {}", paths.csv.display());
            println!("  JSON:   {}", paths.json.display());
        }
        None => println!("  No line items matched, nothing exported."),
    }
    if outcome.locations_saved {
        println!("  New location assignments saved.");
    }
    if !outcome.report.failures.is_empty() {
        println!("  Skipped ({}):", outcome.report.failures.len());
        for failure in &outcome.report.failures {
            println!("    {}: {}", failure.subject, failure.message);
        }
    }
    println!("  Time:   {:.1}s", outcome.elapsed.as_secs_f64());

    if let Some(reminder) = export::high_value_reminder(outcome.items(), threshold) {
        println!();
        print!("{reminder}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn order_fetching(&self, current: usize, total: usize, label: &str) {
        self.spinner
            .set_message(format!("Fetching order [{current}/{total}] {label}"));
    }

    fn done(&self, _outcome: &PicklistOutcome) {
        self.spinner.finish_and_clear();
    }
}

/// Terminal prompt that hides the spinner while the operator answers.
struct SpinnerPrompt {
    spinner: ProgressBar,
}

impl LocationPolicy for SpinnerPrompt {
    fn decide(
        &mut self,
        set_code: &str,
        labels: &[String],
    ) -> cardpick_shared::Result<LocationDecision> {
        self.spinner.suspend(|| {
            let stdin = std::io::stdin();
            PromptOperator::new(stdin.lock(), std::io::stdout()).decide(set_code, labels)
        })
    }
}

// ---------------------------------------------------------------------------
// locations / config
// ---------------------------------------------------------------------------

fn cmd_locations(action: LocationsAction) -> Result<()> {
    let config = load_config()?;
    let mut resolver = LocationResolver::open(
        &config.locations.file,
        RejectUnknown,
        config.locations.default_label.clone(),
    );

    match action {
        LocationsAction::List => {
            if resolver.mapping().is_empty() {
                println!("No locations assigned yet.");
                return Ok(());
            }
            for label in resolver.known_labels() {
                let sets: Vec<&str> = resolver
                    .mapping()
                    .iter()
                    .filter(|(_, l)| **l == label)
                    .map(|(s, _)| s.as_str())
                    .collect();
                println!("{label}: {}", sets.join(", "));
            }
        }
        LocationsAction::Set { set, label } => {
            resolver.assign(&set, &label)?;
            resolver.save_if_changed()?;
            println!("{} → {}", set.to_uppercase(), label.trim());
        }
        LocationsAction::Remove { set } => match resolver.remove(&set) {
            Some(label) => {
                resolver.save_if_changed()?;
                println!("Removed {} (was {label})", set.to_uppercase());
            }
            None => return Err(eyre!("no location assigned for set '{set}'")),
        },
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn run_flags_parse() {
        let cli = parse(&["cardpick", "run", "--filter", "shipped", "--prices", "-vv"]);
        assert_eq!(cli.verbose, 2);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.filter, Some(OrderFilter::Shipped));
        assert!(args.prices);
        assert_eq!(args.auto_assign, None);
    }

    #[test]
    fn auto_assign_with_and_without_label() {
        let Command::Run(args) = parse(&["cardpick", "run", "--auto-assign"]).command else {
            panic!("expected run");
        };
        assert_eq!(args.auto_assign.as_deref(), Some(""));

        let Command::Run(args) = parse(&["cardpick", "run", "--auto-assign", "Overflow"]).command
        else {
            panic!("expected run");
        };
        assert_eq!(args.auto_assign.as_deref(), Some("Overflow"));
    }

    #[test]
    fn recent_overrides_config_filter() {
        let Command::Run(args) = parse(&["cardpick", "run", "--recent", "20"]).command else {
            panic!("expected run");
        };
        let retrieve = resolve_filter(&args, &AppConfig::default()).unwrap();
        assert_eq!(retrieve.filter, OrderFilter::MostRecent(20));

        let Command::Run(args) = parse(&["cardpick", "run", "--recent", "0"]).command else {
            panic!("expected run");
        };
        assert!(resolve_filter(&args, &AppConfig::default()).is_err());
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        assert!(
            Cli::try_parse_from(["cardpick", "run", "--filter", "all", "--recent", "3"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["cardpick", "run", "--no-images", "--download-images"]).is_err()
        );
        assert!(Cli::try_parse_from(["cardpick", "run", "--filter", "later"]).is_err());
    }

    #[test]
    fn auto_assign_from_config() {
        let Command::Run(args) = parse(&["cardpick", "run"]).command else {
            panic!("expected run");
        };
        let mut config = AppConfig::default();
        config.locations.auto_assign = true;
        let mut policy = location_policy(&args, &config, &ProgressBar::hidden());
        assert_eq!(
            policy.decide("WOE", &[]).unwrap(),
            LocationDecision::Assign("Unassigned".into())
        );
    }
}
