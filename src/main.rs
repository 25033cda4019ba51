//! Touchline main entry point
//!
//! This is the command-line interface for the Touchline request dispatcher.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use touchline::config::{load_config_with_hash, validate, Config};
use touchline::dispatch::Pacing;
use touchline::fetch::{RequestHandler, ResponseShape};
use touchline::output::{load_statistics, print_statistics};
use touchline::storage::{archive_fetches, open_archive, Archive, RunStatus};
use tracing_subscriber::EnvFilter;

/// Touchline: a paced request dispatcher for league scrapers
///
/// Every request goes through one scheduler that sends small randomized
/// batches separated by randomized pauses. Fetched bodies are archived in
/// SQLite.
#[derive(Parser, Debug)]
#[command(name = "touchline")]
#[command(version = "1.0.0")]
#[command(about = "A paced request dispatcher for league scrapers", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults if omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the archive and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch URLs through the paced dispatcher and archive the results
    Fetch {
        /// URLs to fetch, queued in the order given
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Archive raw bytes instead of decoded text
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    (cfg, hash)
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            let config = Config::default();
            validate(&config)?;
            (config, "default".to_string())
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        match cli.command {
            Some(Command::Fetch { urls, raw }) => {
                let shape = if raw {
                    ResponseShape::Raw
                } else {
                    ResponseShape::Text
                };
                handle_fetch(&config, &config_hash, urls, shape).await?;
            }
            None => {
                eprintln!("Nothing to do; try `touchline fetch <URL>...` or `touchline --help`");
            }
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("touchline=info,warn"),
            1 => EnvFilter::new("touchline=debug,info"),
            2 => EnvFilter::new("touchline=trace,debug"),
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

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    let pacing = Pacing::from(&config.pacing);

    println!("=== Touchline Dry Run ===\n");

    println!("Pacing:");
    println!(
        "  Batch size: {}-{} jobs",
        pacing.batch_min, pacing.batch_max
    );
    println!(
        "  Delay between batches: {:?}-{:?}",
        pacing.delay_min, pacing.delay_max
    );
    println!("  Queue pull timeout: {:?}", pacing.pull_timeout);
    println!("  Idle pause: {:?}", pacing.idle_pause);

    println!("\nHTTP:");
    println!("  Request timeout: {}s", config.http.request_timeout_secs);
    println!("  Connect timeout: {}s", config.http.connect_timeout_secs);
    println!("  User agents ({}):", config.http.user_agents.len());
    for agent in &config.http.user_agents {
        println!("    - {}", agent);
    }

    println!("\nNavigation:");
    println!("  WebDriver: {}", config.navigation.webdriver_url);
    println!(
        "  Navigation timeout: {}s",
        config.navigation.navigation_timeout_secs
    );

    println!("\nShutdown:");
    println!(
        "  Signal hooks: {}",
        if config.shutdown.install_signal_hooks {
            "enabled"
        } else {
            "disabled"
        }
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the archive
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let archive = open_archive(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&archive)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the fetch command: queues every URL, then archives each outcome
async fn handle_fetch(
    config: &Config,
    config_hash: &str,
    urls: Vec<String>,
    shape: ResponseShape,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut archive = open_archive(Path::new(&config.output.database_path))?;
    let run_id = archive.create_run(config_hash)?;

    let handler = RequestHandler::new(config);
    if let Err(e) = handler.configure().await {
        tracing::error!("Failed to start the dispatcher: {}", e);
        handler.shutdown().await;
        archive.finish_run(run_id, RunStatus::Interrupted)?;
        return Err(e.into());
    }

    let summary = archive_fetches(&mut archive, run_id, &handler, urls, shape).await?;

    println!(
        "Run #{} {}: {} fetched, {} failed",
        summary.run_id,
        summary.status.to_db_string(),
        summary.fetched,
        summary.failed
    );

    Ok(())
}
