//! Reel-Harvest main entry point
//!
//! This is the command-line interface for the Reel-Harvest listing harvester.

use anyhow::Context;
use clap::Parser;
use reel_harvest::config::{load_config_with_hash, Config};
use reel_harvest::crawler::run_harvest;
use reel_harvest::output::{export_json, load_statistics, print_statistics};
use reel_harvest::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Reel-Harvest: a polite listing harvester
///
/// Reel-Harvest walks a paginated ranking listing, extracts one record per
/// detail page, upserts it into SQLite under a stable identity and downloads
/// its cover image. Re-running never duplicates records.
#[derive(Parser, Debug)]
#[command(name = "reel-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_json"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_json"])]
    stats: bool,

    /// Write every stored record to a JSON file and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = cli.export_json.as_deref() {
        handle_export_json(&config, path)?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reel_harvest=info,warn"),
            1 => EnvFilter::new("reel_harvest=debug,info"),
            2 => EnvFilter::new("reel_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Reel-Harvest Dry Run ===\n");

    println!("Source:");
    println!("  Root URL: {}", config.source.root_url);
    match config.source.page_limit {
        Some(limit) => println!("  Page limit: {}", limit),
        None => println!("  Page limit: none"),
    }

    println!("\nFetcher:");
    println!("  User agent: {}", config.fetcher.user_agent);
    println!("  Politeness interval: {}ms", config.fetcher.politeness_interval_ms);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.fetcher.timeout_secs, config.fetcher.connect_timeout_secs
    );
    println!(
        "  Retries: {} attempts, backoff {}ms..{}ms",
        config.fetcher.max_attempts, config.fetcher.backoff_base_ms, config.fetcher.backoff_max_ms
    );

    println!("\nPipeline:");
    println!("  Workers: {}", config.pipeline.workers);
    println!("  Persist attempts: {}", config.pipeline.persist_attempts);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Images: {}", config.output.image_dir);

    println!("\nSelectors:");
    for (field, selector) in config.selectors.selectors() {
        println!("  {:<16} {}", field, selector);
    }
    for (field, label) in config.selectors.labels() {
        println!("  {:<16} \"{}\"", field, label);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-json mode: dumps every record ordered by rank
fn handle_export_json(config: &Config, path: &Path) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;

    let count = export_json(&storage, path)
        .with_context(|| format!("Failed to export records to {}", path.display()))?;
    println!("✓ Exported {} records to: {}", count, path.display());

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // First Ctrl-C stops handing out work; in-flight records still finish
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight records");
            signal_token.cancel();
        }
    });

    match run_harvest(config, config_hash, cancel).await {
        Ok(summary) if summary.cancelled => {
            tracing::warn!("Harvest interrupted after {} records", summary.persisted);
            Ok(())
        }
        Ok(summary) => {
            tracing::info!("Harvest completed: {} records persisted", summary.persisted);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
