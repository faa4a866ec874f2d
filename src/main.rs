//! Catalog-Harvester main entry point
//!
//! This is the command-line interface for the Catalog-Harvester crawler.

use catalog_harvester::checkpoint::{CheckpointStore, FileCheckpointStore};
use catalog_harvester::config::{load_config, load_config_with_hash, Config};
use catalog_harvester::crawler::{resolve_start, CrawlBounds, CrawlOutcome, Orchestrator};
use catalog_harvester::sink::build_sink;
use catalog_harvester::worker::{build_executor, serve_worker, TaskKind, WorkerTask};
use catalog_harvester::HarvestError;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code of an interrupted crawl (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

/// Catalog-Harvester: a resumable classifieds catalog crawler
///
/// Catalog-Harvester walks every region, category filter and page of a
/// paginated catalog, extracts a record from each listing it discovers and
/// resumes where it stopped after an interruption.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable classifieds catalog crawler", long_about = None)]
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

    /// Start a fresh crawl, ignoring the stored checkpoint
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "show_checkpoint")]
    dry_run: bool,

    /// Show the stored checkpoint and exit
    #[arg(long, conflicts_with = "dry_run")]
    show_checkpoint: bool,

    /// Run a single unit of work as an isolated worker
    #[arg(long, value_enum, hide = true, requires = "target")]
    worker: Option<TaskKind>,

    /// Address handled by the worker
    #[arg(long, hide = true, requires = "worker")]
    target: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let (Some(kind), Some(target)) = (cli.worker, cli.target.clone()) {
        setup_logging(cli.verbose, cli.quiet, true);
        return run_worker(&cli, WorkerTask { kind, target }).await;
    }

    setup_logging(cli.verbose, cli.quiet, false);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Handle different modes
    let result = if cli.dry_run {
        handle_dry_run(&config, &config_hash, cli.fresh)
    } else if cli.show_checkpoint {
        handle_show_checkpoint(&config)
    } else {
        handle_crawl(&cli, config, config_hash).await
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Workers log to stderr because stdout carries their completion message.
fn setup_logging(verbose: u8, quiet: bool, worker: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvester=info,warn"),
            1 => EnvFilter::new("catalog_harvester=debug,info"),
            2 => EnvFilter::new("catalog_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    if worker {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

/// Arguments that point a worker process at the same configuration and verbosity
fn worker_args(cli: &Cli) -> Vec<OsString> {
    let mut args = vec![cli.config.clone().into_os_string()];
    if cli.quiet {
        args.push("--quiet".into());
    } else if cli.verbose > 0 {
        args.push(format!("-{}", "v".repeat(usize::from(cli.verbose))).into());
    }
    args
}

/// Handles the hidden --worker mode: performs one unit and reports it on stdout
async fn run_worker(cli: &Cli, task: WorkerTask) -> ExitCode {
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Worker failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if serve_worker(&config, &task).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, config_hash: &str, fresh: bool) -> Result<ExitCode, HarvestError> {
    let bounds = CrawlBounds::from_config(&config.crawler);

    println!("=== Catalog-Harvester Dry Run ===\n");

    println!("Crawl Space:");
    println!("  Regions ({}):", config.crawler.regions.len());
    for region in &config.crawler.regions {
        println!("    - {}", region);
    }
    println!("  Filter values: 1..={}", config.crawler.max_filter);
    println!("  Pages per filter: 1..={}", config.crawler.max_page);
    println!("  Catalog pages total: {}", bounds.total_units());

    println!("\nPoliteness:");
    println!(
        "  Delay: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!(
        "  Attempts: {} per catalog page, {} per listing",
        config.crawler.max_attempts, config.crawler.listing_attempts
    );
    println!(
        "  Operation timeout: {}ms ({:?} workers)",
        config.crawler.operation_timeout_ms, config.crawler.isolation
    );

    println!("\nExtraction:");
    println!("  Child links: {}", config.renderer.child_link_selector);
    for field in &config.parser.fields {
        println!(
            "  - {}{}",
            field.name,
            if field.required { " (required)" } else { "" }
        );
    }

    println!("\nOutput:");
    println!(
        "  Records: {} ({:?})",
        config.output.records_path, config.output.format
    );
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    if let Some(remote) = &config.remote {
        println!(
            "  Replica: {}:{} on {}",
            remote.repository, remote.path, remote.branch
        );
    }

    let start = if fresh {
        catalog_harvester::CrawlPosition::initial()
    } else {
        let store = FileCheckpointStore::new(&config.output.checkpoint_path);
        resolve_start(&store, &bounds, Some(config_hash))?
    };
    let first_url = config
        .crawler
        .catalog_url(start.region_index, start.filter_value, start.page)
        .unwrap_or_default();

    println!("\n✓ Configuration is valid");
    println!("✓ Would start at {}: {}", start, first_url);

    Ok(ExitCode::SUCCESS)
}

/// Handles the --show-checkpoint mode: prints the stored checkpoint
fn handle_show_checkpoint(config: &Config) -> Result<ExitCode, HarvestError> {
    let store = FileCheckpointStore::new(&config.output.checkpoint_path);
    println!("Checkpoint: {}\n", store.path().display());

    match store.load()? {
        Some(checkpoint) => {
            let region = config
                .crawler
                .regions
                .get(checkpoint.position.region_index)
                .map(String::as_str)
                .unwrap_or("<unknown region>");
            println!("  Next position: {}", checkpoint.position);
            println!("  Region: {}", region);
            println!("  Saved at: {}", checkpoint.saved_at.to_rfc3339());
            if let Some(hash) = &checkpoint.config_hash {
                println!("  Config hash: {}", hash);
            }
        }
        None => println!("  No usable checkpoint, a crawl would start at the beginning"),
    }

    Ok(ExitCode::SUCCESS)
}

/// Handles the main crawl operation
async fn handle_crawl(
    cli: &Cli,
    config: Config,
    config_hash: String,
) -> Result<ExitCode, HarvestError> {
    if cli.fresh {
        tracing::info!("Starting fresh crawl (ignoring stored checkpoint)");
    } else {
        tracing::info!("Starting crawl (will resume from checkpoint if present)");
    }

    let executor = build_executor(&config, worker_args(cli))?;
    let store = Box::new(FileCheckpointStore::new(&config.output.checkpoint_path));
    let sink = build_sink(&config)?;

    let mut orchestrator = Orchestrator::new(&config, executor, store, sink)
        .with_config_hash(config_hash)
        .fresh(cli.fresh);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::warn!("Process interrupted. Saving state..."),
            Err(e) => {
                tracing::error!("Failed to listen for interrupts: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    match orchestrator.run_until(shutdown).await? {
        CrawlOutcome::Completed => {
            tracing::info!("Crawl completed successfully");
            Ok(ExitCode::SUCCESS)
        }
        CrawlOutcome::Interrupted(position) => {
            tracing::info!("Crawl interrupted, will resume at {}", position);
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}
