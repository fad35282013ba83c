//! Adwatch main entry point
//!
//! This is the command-line interface for the Adwatch marketplace monitor.

use adwatch::config::{load_config_with_hash, Config};
use adwatch::extract::HtmlExtractor;
use adwatch::monitor::{InstanceLock, MonitorHandle, Scheduler};
use adwatch::notify::TelegramNotifier;
use adwatch::stats::StatsLedger;
use adwatch::transport::{ReqwestFetcher, TransportManager};
use adwatch::{cancel::StopToken, dedup::FingerprintStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Adwatch: a resilient classifieds-marketplace monitor
///
/// Adwatch polls marketplace search pages for keyword matches inside a
/// daily operating window, deduplicates listings across runs, and pushes
/// new matches to a Telegram chat in size-bounded batches.
#[derive(Parser, Debug)]
#[command(name = "adwatch")]
#[command(version = "1.0.0")]
#[command(about = "A resilient classifieds-marketplace monitor", long_about = None)]
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

    /// Validate config and show what would be monitored without fetching
    #[arg(long, conflicts_with_all = ["stats", "export_stats", "reset_stats", "once"])]
    dry_run: bool,

    /// Run a single monitoring cycle and exit (ignores the operating window)
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_stats", "reset_stats"])]
    once: bool,

    /// Show statistics from the ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_stats", "reset_stats"])]
    stats: bool,

    /// Export the full statistics ledger as JSON to the given path and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats", "reset_stats"])]
    export_stats: Option<PathBuf>,

    /// Clear the statistics ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_stats"])]
    reset_stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config);
    } else if let Some(path) = &cli.export_stats {
        handle_export_stats(&config, path)?;
    } else if cli.reset_stats {
        handle_reset_stats(&config)?;
    } else {
        handle_monitor(config, cli.once).await?;
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
            0 => EnvFilter::new("adwatch=info,warn"),
            1 => EnvFilter::new("adwatch=debug,info"),
            2 => EnvFilter::new("adwatch=trace,debug"),
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

fn stats_path(config: &Config) -> PathBuf {
    Path::new(&config.storage.data_dir).join("stats.json")
}

/// Handles the --dry-run mode: validates config and shows the search plan
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use adwatch::monitor::SearchPlan;

    println!("=== Adwatch Dry Run ===\n");

    println!("Search:");
    println!("  Base URL: {}", config.search.base_url);
    println!("  Keywords: {}", config.search.keywords.join(", "));
    println!(
        "  Negative keywords: {}",
        if config.search.negative_keywords.is_empty() {
            "(none)".to_string()
        } else {
            config.search.negative_keywords.join(", ")
        }
    );
    println!("  Pages per cycle: {}", config.search.max_pages_per_cycle);

    let plan = SearchPlan::from_config(&config.search)?;
    println!("\nPage URLs ({} permutation(s)):", plan.permutations().len());
    for set in plan.permutations() {
        for page in 1..=config.search.max_pages_per_cycle {
            println!("  - {}", plan.page_url(set, page));
        }
    }

    println!("\nSchedule:");
    println!(
        "  Operating window: {:02}:00-{:02}:00 (UTC{:+})",
        config.schedule.window_start_hour,
        config.schedule.window_end_hour,
        config.schedule.utc_offset_hours
    );
    println!(
        "  Interval: base {}min, cap {}min, x{} after {} empty pages",
        config.schedule.base_interval_mins,
        config.schedule.max_interval_mins,
        config.schedule.interval_multiplier,
        config.schedule.empty_page_threshold
    );
    println!("  Cycle wait: {}min", config.schedule.cycle_wait_mins);

    println!("\nNotification:");
    println!("  Chat id: {}", config.notify.chat_id);
    println!(
        "  Chunking: {} items / {} chars per message",
        config.notify.chunk_size, config.notify.max_message_chars
    );

    println!("\nStorage:");
    println!("  Data directory: {}", config.storage.data_dir);

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: prints ledger aggregates
fn handle_stats(config: &Config) {
    let ledger = StatsLedger::open(&stats_path(config));
    let overall = ledger.overall_stats();

    println!("=== Adwatch Statistics ===\n");
    println!("Recent window: {} record(s)", overall.total);
    println!("  Successes: {}", overall.successes);
    println!("  Errors: {}", overall.errors);
    println!("  Success rate: {:.1}%", overall.success_rate * 100.0);

    println!("\nPer keyword set (all-time):");
    let mut sets: Vec<_> = ledger.stats_by_keyword_set().iter().collect();
    sets.sort_by(|a, b| a.0.cmp(b.0));
    for (key, counters) in sets {
        println!(
            "  {} - {} ok, {} failed, {} ads found",
            key, counters.successes, counters.errors, counters.ads_found
        );
    }

    let errors = ledger.recent_errors(5);
    if !errors.is_empty() {
        println!("\nMost recent errors:");
        for record in errors {
            println!(
                "  [{}] page {} of '{}': {:?}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.page,
                record.keyword_set,
                record.outcome
            );
        }
    }
}

/// Handles --export-stats: writes the ledger snapshot as JSON
fn handle_export_stats(config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = StatsLedger::open(&stats_path(config));
    ledger.export_stats(path)?;
    println!("✓ Statistics exported to: {}", path.display());
    Ok(())
}

/// Handles --reset-stats: clears the ledger
fn handle_reset_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut ledger = StatsLedger::open(&stats_path(config));
    ledger.reset_stats()?;
    println!("✓ Statistics cleared");
    Ok(())
}

/// Handles the main monitoring operation
async fn handle_monitor(config: Config, once: bool) -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = Path::new(&config.storage.data_dir).to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    // Only one monitor instance may run against this data directory
    let _lock = InstanceLock::acquire(&data_dir.join("adwatch.lock"))?;

    let fetcher = ReqwestFetcher::new(Duration::from_secs(config.transport.request_timeout_secs))?;
    let transport = TransportManager::new(
        fetcher,
        config.transport.clone(),
        data_dir.join("session.json"),
    );
    let extractor = HtmlExtractor::new(
        &config.search.listing_selector,
        url::Url::parse(&config.search.base_url)?,
    );
    let notifier = TelegramNotifier::new(&config.notify.bot_token)?;
    let store = FingerprintStore::open(&data_dir.join("fingerprints.log"))?;
    let ledger = StatsLedger::open(&data_dir.join("stats.json"));

    tracing::info!(
        "Monitoring '{}' for {:?}, window {:02}:00-{:02}:00",
        config.search.base_url,
        config.search.keywords,
        config.schedule.window_start_hour,
        config.schedule.window_end_hour
    );

    let scheduler = Scheduler::new(config, transport, extractor, notifier, store, ledger)?;

    if once {
        let mut scheduler = scheduler;
        let report = scheduler.run_cycle(&mut StopToken::never()).await;
        println!(
            "Cycle finished: {} page(s) ok, {} failed, {} new listing(s), {} chunk(s) sent",
            report.pages_succeeded, report.pages_failed, report.new_listings, report.chunks_sent
        );
        return Ok(());
    }

    let handle = MonitorHandle::launch(scheduler);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");
    handle.shutdown().await;

    Ok(())
}
