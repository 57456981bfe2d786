use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use offerwatch_client::{ReqwestFetcher, ScraperMarkup};
use offerwatch_core::config::{
    DEFAULT_SOURCES_PATH, DEFAULT_STATE_PATH, DEFAULT_TIMEZONE, load_sources,
};
use offerwatch_core::error::AppError;
use offerwatch_core::extract::OfferExtractor;
use offerwatch_core::models::{ExtractionRule, Source, SweepTrigger};
use offerwatch_core::monitor::{Monitor, MonitorState};
use offerwatch_core::notify::NotificationBatcher;
use offerwatch_core::registry::{SourceRegistry, SubscriberRegistry};
use offerwatch_core::scheduler::SweepRunner;
use offerwatch_core::snapshot::JsonFileStore;
use offerwatch_core::sweep::{SweepService, TracingSweepReporter};
use offerwatch_core::throttle::ThrottleConfig;
use offerwatch_core::traits::{Dispatcher, Fetcher, NullStore, ObservedStore};

const CONSOLE_TARGET: &str = "console";

#[derive(Parser)]
#[command(name = "offerwatch", version, about = "Hotel offer change monitor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sweep over the sources file and print the notification
    Check {
        /// Sources file (JSON array of sources)
        #[arg(short, long, env = "OFFERWATCH_SOURCES", default_value = DEFAULT_SOURCES_PATH)]
        sources: PathBuf,

        /// Observed-offer snapshot to restore from and save to
        #[arg(long)]
        state: Option<PathBuf>,

        /// Pause between sources, in milliseconds
        #[arg(long, env = "OFFERWATCH_SOURCE_DELAY_MS", default_value_t = 3000)]
        delay_ms: u64,

        /// Per-source fetch timeout, in seconds
        #[arg(long, env = "OFFERWATCH_FETCH_TIMEOUT_SECS", default_value_t = 15)]
        timeout: u64,

        /// IANA timezone for notification timestamps
        #[arg(long, env = "OFFERWATCH_TIMEZONE", default_value = DEFAULT_TIMEZONE)]
        timezone: String,
    },

    /// Extract offers from a single page and print them as JSON
    Extract {
        /// Page URL
        #[arg(short, long)]
        url: String,

        /// Container selector override
        #[arg(short, long)]
        container: Option<String>,

        /// Fetch timeout, in seconds
        #[arg(long, default_value_t = 15)]
        timeout: u64,
    },

    /// List the sources in a sources file
    Sources {
        #[arg(short, long, env = "OFFERWATCH_SOURCES", default_value = DEFAULT_SOURCES_PATH)]
        sources: PathBuf,
    },

    /// List the offers recorded in a snapshot file
    State {
        #[arg(short, long, env = "OFFERWATCH_STATE_PATH", default_value = DEFAULT_STATE_PATH)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("offerwatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            sources,
            state,
            delay_ms,
            timeout,
            timezone,
        } => {
            let timezone: Tz = timezone
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid timezone '{timezone}': {e}"))?;
            let sweep = SweepService::new(
                ReqwestFetcher::new()?.allow_private_urls(),
                ScraperMarkup::new(),
            )
            .with_throttle(ThrottleConfig::new(Duration::from_millis(delay_ms)))
            .with_fetch_timeout(Duration::from_secs(timeout));
            let sources = load_sources(&sources)?;

            match state {
                Some(path) => {
                    cmd_check(sources, sweep, JsonFileStore::new(path), timezone).await?
                }
                None => cmd_check(sources, sweep, NullStore, timezone).await?,
            }
        }
        Commands::Extract {
            url,
            container,
            timeout,
        } => cmd_extract(&url, container, Duration::from_secs(timeout)).await?,
        Commands::Sources { sources } => cmd_sources(&sources)?,
        Commands::State { path } => cmd_state(path).await?,
    }

    Ok(())
}

/// Prints deliveries to stdout instead of pushing them anywhere.
#[derive(Debug, Clone, Copy)]
struct ConsoleDispatcher;

impl Dispatcher for ConsoleDispatcher {
    async fn deliver(&self, _target: &str, message: &str) -> Result<(), AppError> {
        println!("{message}");
        Ok(())
    }

    async fn reply(&self, _reply_token: &str, message: &str) -> Result<(), AppError> {
        println!("{message}");
        Ok(())
    }
}

async fn cmd_check<S: ObservedStore>(
    sources: Vec<Source>,
    sweep: SweepService<ReqwestFetcher, ScraperMarkup>,
    store: S,
    timezone: Tz,
) -> Result<()> {
    if sources.is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    let mut subscribers = SubscriberRegistry::new();
    subscribers.subscribe(CONSOLE_TARGET, CONSOLE_TARGET);
    let state = Arc::new(MonitorState::new(
        SourceRegistry::from_sources(sources),
        subscribers,
    ));

    let monitor = Monitor::new(
        state,
        sweep,
        ConsoleDispatcher,
        store,
        NotificationBatcher::new(timezone),
    );
    monitor
        .restore(&TracingSweepReporter)
        .await
        .context("Failed to restore snapshot")?;

    let result = monitor
        .run_sweep(SweepTrigger::OnDemand, &TracingSweepReporter)
        .await;

    if !result.has_changes() {
        println!("No new or changed offers");
    }
    for failure in &result.failures {
        eprintln!("  [failed] {}: {}", failure.source_name, failure.error);
    }
    println!(
        "\nChecked {}/{} sources, {} changed offers",
        result.sources_checked,
        result.sources_checked + result.failures.len(),
        result.changed_offers.len()
    );

    Ok(())
}

async fn cmd_extract(url: &str, container: Option<String>, timeout: Duration) -> Result<()> {
    let rule = container
        .map(ExtractionRule::with_container)
        .unwrap_or_default();
    let source = Source::new("cli", url).with_rule(rule);

    tracing::info!("Fetching {}", url);
    let fetcher = ReqwestFetcher::new()
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    let content = fetcher.fetch(url, timeout).await?;
    tracing::info!("Fetched {} bytes", content.len());

    let offers = OfferExtractor::new(ScraperMarkup::new()).extract(&source, &content)?;
    tracing::info!(offers = offers.len(), "Extraction complete");

    println!("{}", serde_json::to_string_pretty(&offers)?);
    Ok(())
}

fn cmd_sources(path: &std::path::Path) -> Result<()> {
    let sources = load_sources(path)?;
    if sources.is_empty() {
        println!("No sources found in {}", path.display());
        return Ok(());
    }

    for (i, source) in sources.iter().enumerate() {
        println!("  {}. {}  {}", i + 1, source.name, source.location);
    }
    println!("\nTotal: {} sources", sources.len());
    Ok(())
}

async fn cmd_state(path: PathBuf) -> Result<()> {
    let store = JsonFileStore::new(path);
    let offers = store.load().await?;
    if offers.is_empty() {
        println!("No offers recorded in {}", store.path().display());
        return Ok(());
    }

    for offer in &offers {
        println!(
            "  [{}] {}: {} ({})",
            offer.observed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            offer.source_name,
            offer.title,
            offer.price.as_deref().unwrap_or("-"),
        );
    }
    println!("\nTotal: {} offers", offers.len());
    Ok(())
}
