//! Job Router CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use job_router::{
    error::Result,
    models::Config,
    pipeline::{IdentitySet, IdentitySource, Pipeline},
    services::{BridgeClient, BridgeListing, JobSource, ListingFileSource},
    storage::CsvStore,
    utils::{report, url::is_remote},
};

/// Job Router - deduplicating job application runner
#[derive(Parser, Debug)]
#[command(
    name = "job-router",
    version,
    about = "Route scraped job listings into outcome tables"
)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "job-router.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk a listing and route every new job
    Run {
        /// Listing table path, or a search URL crawled through the bridge
        location: String,

        /// Stop after this many processed (non-skipped) jobs
        #[arg(long, conflicts_with = "pages")]
        target: Option<usize>,

        /// Stop after this many pages
        #[arg(long)]
        pages: Option<u32>,
    },

    /// Remove duplicate rows from a store, keeping first occurrences
    Dedupe {
        /// Store file to compact
        store: PathBuf,

        /// Column holding the job key
        #[arg(long, default_value_t = 0)]
        key_column: usize,
    },

    /// Validate configuration and report identity sources
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        log::info!("No config at {}, using defaults", cli.config.display());
        Config::default()
    };

    match cli.command {
        Command::Run {
            location,
            target,
            pages,
        } => {
            if target.is_some() || pages.is_some() {
                config.run.target_count = target;
                config.run.page_limit = pages;
            }
            run(&config, &location).await
        }
        Command::Dedupe { store, key_column } => dedupe(store, key_column).await,
        Command::Validate => validate(&config).await,
    }
}

async fn run(config: &Config, location: &str) -> Result<()> {
    let pipeline = Pipeline::open(config).await?;
    let bridge = BridgeClient::new(&config.bridge)?;

    let mut source: Box<dyn JobSource> = if is_remote(location) {
        log::info!("Crawling {} through {}", location, bridge.base_url());
        Box::new(BridgeListing::new(bridge.clone(), location))
    } else {
        Box::new(ListingFileSource::new(location, config.run.page_size))
    };

    let summary = pipeline.run(source.as_mut(), &bridge).await;
    summary.log();

    let stats_path = config.storage.dir.join("run_stats.json");
    if let Err(e) = summary.write_stats(&stats_path).await {
        log::warn!("Failed to write {}: {}", stats_path.display(), e);
    }

    summary.into_result().map(|_| ())
}

async fn dedupe(path: PathBuf, key_column: usize) -> Result<()> {
    let store = CsvStore::new(&path);
    let compacted = store.compact(key_column).await?;

    if !compacted.removed.is_empty() {
        report::header("Removed rows");
        for key in &compacted.removed {
            log::info!("    {}", key);
        }
    }
    report::summary(
        &format!("Compacted {}", path.display()),
        &[
            ("unique keys".to_string(), compacted.unique.to_string()),
            ("duplicates removed".to_string(), compacted.removed.len().to_string()),
            ("malformed rows".to_string(), compacted.malformed.to_string()),
        ],
    );
    Ok(())
}

async fn validate(config: &Config) -> Result<()> {
    log::info!("Validating configuration...");
    config.validate()?;
    log::info!("✓ Config OK");

    let (identity, sources) = IdentitySet::load(&IdentitySource::from_config(config)).await?;
    let items: Vec<(String, String)> = sources
        .iter()
        .map(|s| {
            let status = if s.found {
                format!("{} rows, {} malformed", s.rows, s.malformed)
            } else {
                "missing".to_string()
            };
            (format!("{} ({})", s.label, s.path.display()), status)
        })
        .collect();
    report::summary("Identity sources", &items);
    log::info!("{} known jobs", identity.len());

    if sources.iter().all(|s| !s.found) {
        log::warn!("No identity source exists yet; every listed job will be treated as new");
    }
    Ok(())
}
