//! course-harvest main entry point
//!
//! This is the command-line interface for the course catalog harvester.

use anyhow::Context;
use clap::Parser;
use course_harvest::config::{load_config_with_hash, Config};
use course_harvest::crawler::{user_agent_string, Coordinator, RunConfiguration};
use course_harvest::output::{load_statistics, print_statistics};
use course_harvest::storage::open_storage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// course-harvest: a bounded-concurrency course catalog harvester
///
/// course-harvest discovers course pages from catalog search listings,
/// fetches and parses them concurrently, and stores only the courses it
/// has not seen before.
#[derive(Parser, Debug)]
#[command(name = "course-harvest")]
#[command(version)]
#[command(about = "A bounded-concurrency course catalog harvester", long_about = None)]
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

    /// Validate config and show the listing pages without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export", "retry_failed"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "retry_failed"])]
    stats: bool,

    /// Export every stored course to CSV and JSON and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "retry_failed"])]
    export: bool,

    /// Re-run only the links that failed in the latest run
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export"])]
    retry_failed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export {
        handle_export(config, config_hash)?;
    } else {
        handle_harvest(config, config_hash, cli.retry_failed).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "course_harvest=info,warn",
            1 => "course_harvest=debug,info",
            2 => "course_harvest=trace,debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and lists the listing pages
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let run = RunConfiguration::from_config(config)?;

    println!("=== course-harvest Dry Run ===\n");

    println!("Run Configuration:");
    println!("  Max concurrent tasks: {}", run.max_concurrent_tasks);
    println!("  Timeout: {}ms", run.timeout.as_millis());
    println!("  Fetch attempts: {}", run.retry.attempts);
    println!(
        "  Backoff: {}ms x{} (max {}ms)",
        run.retry.backoff.initial.as_millis(),
        run.retry.backoff.multiplier,
        run.retry.backoff.max.as_millis()
    );
    println!("  Unique key: {}", run.key_strategy);
    println!(
        "  Instructor profiles: {}",
        if run.fetch_instructor_profiles {
            "fetched"
        } else {
            "skipped"
        }
    );

    println!("\nUser Agent:");
    println!("  {}", user_agent_string(&config.user_agent));

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Exports: {}", config.output.export_dir);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nListing Pages ({}):", run.listing_urls.len());
    for url in &run.listing_urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: exports every stored course
fn handle_export(config: Config, config_hash: String) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config, config_hash)?;
    let written = coordinator.export_stored()?;

    for path in written {
        println!("✓ Wrote {}", path.display());
    }

    Ok(())
}

/// Handles the main harvest operation
///
/// Ctrl-C stops admitting new links; links already in flight finish and the
/// partial run is recorded as interrupted.
async fn handle_harvest(
    config: Config,
    config_hash: String,
    retry_failed: bool,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight links");
            on_signal.cancel();
        }
    });

    let coordinator = Coordinator::new(config, config_hash)?;
    let outcome = if retry_failed {
        coordinator.retry_failed(cancel).await
    } else {
        coordinator.run(cancel).await
    }
    .context("harvest failed")?;

    let summary = &outcome.summary;
    println!(
        "Run {} {}: {} new, {} duplicates, {} failed, {} not attempted",
        outcome.run_id,
        summary.termination,
        summary.done,
        summary.skipped,
        summary.failed,
        summary.not_attempted
    );
    for path in &summary.exported_files {
        println!("✓ Wrote {}", path.display());
    }

    Ok(())
}
