//! # News Harvester
//!
//! Command-line front end for the extraction and crawl engine.
//!
//! ## Usage
//!
//! ```sh
//! news_harvester scrape -p sources.yaml
//! news_harvester historical -p sources.yaml --from-days 15 --to-days 3
//! news_harvester discover https://www.example.com
//! news_harvester sitemap https://www.example.com/sitemap.xml
//! ```
//!
//! ## Architecture
//!
//! 1. **Setup**: tracing, CLI, engine configuration, HTTP fetcher
//! 2. **Dispatch**: one handler per subcommand
//! 3. **Output**: articles go to the JSON store; reports are printed as JSON

use chrono::Utc;
use clap::Parser;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use news_harvester::cancel::CancelFlag;
use news_harvester::config::{EngineConfig, load_profiles};
use news_harvester::fetch::{HttpFetcher, PageFetcher};
use news_harvester::models::{CrawlWindow, IngestStats, OwnerId, SourceProfile};
use news_harvester::outputs::json::JsonFileRepository;
use news_harvester::repository::Repository;
use news_harvester::scrapers::historical::HistoricalIngestor;
use news_harvester::scrapers::routine::RoutineRunner;
use news_harvester::scrapers::sitemap::SitemapCrawler;
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command};

#[derive(Debug, Serialize)]
struct SourceOutcome {
    source: String,
    #[serde(flatten)]
    stats: IngestStats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_harvester starting up");

    let args = Cli::parse();
    debug!(?args.config, store = %args.store, "Parsed CLI arguments");

    let config = EngineConfig::load(args.config.as_deref())?;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config)?);

    match args.command {
        Command::Scrape { profiles, limit } => {
            let profiles = load_profiles(&profiles)?;
            let repository: Arc<dyn Repository> = Arc::new(JsonFileRepository::open(&args.store).await?);
            let limit = limit.unwrap_or(config.default_listing_limit);
            run_scrape(fetcher, repository, &config, &profiles, limit).await?;
        }
        Command::Historical {
            profiles,
            source,
            from_days,
            to_days,
            url_cap,
            owner,
            concurrency,
        } => {
            let profiles: Vec<SourceProfile> = load_profiles(&profiles)?
                .into_iter()
                .filter(|p| p.active && source.is_none_or(|id| p.id == id))
                .collect();
            if profiles.is_empty() {
                warn!(?source, "No matching active source profiles");
                return Ok(());
            }
            let repository: Arc<dyn Repository> = Arc::new(JsonFileRepository::open(&args.store).await?);
            let plan = HistoricalPlan {
                from_days: from_days.unwrap_or(config.default_from_days),
                to_days: to_days.unwrap_or(config.default_to_days),
                url_cap: url_cap.unwrap_or(config.default_url_cap),
                owner,
                concurrency: concurrency.max(1),
            };
            run_historical(fetcher, repository, &config, &profiles, plan).await?;
        }
        Command::Discover { base_url } => {
            let crawler = SitemapCrawler::new(fetcher, &config);
            match crawler.discover_sitemap(&base_url).await {
                Some(url) => println!("{url}"),
                None => warn!(%base_url, "No sitemap found"),
            }
        }
        Command::Sitemap {
            url,
            from_days,
            to_days,
        } => {
            let window = if from_days.is_some() || to_days.is_some() {
                Some(CrawlWindow::days_ago(
                    from_days.unwrap_or(config.default_from_days),
                    to_days.unwrap_or(config.default_to_days),
                    Utc::now(),
                    config.window_buffer(),
                )?)
            } else {
                None
            };
            let crawler = SitemapCrawler::new(fetcher, &config);
            let entries = crawler.list_entries(&url, window.as_ref()).await?;
            for entry in &entries {
                let lastmod = entry
                    .last_modified
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}\t{}", entry.url, lastmod);
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs(),
        elapsed_ms = elapsed.as_millis() as u64,
        "news_harvester completed"
    );
    Ok(())
}

/// Routine run, once per owner found in the profiles.
async fn run_scrape(
    fetcher: Arc<dyn PageFetcher>,
    repository: Arc<dyn Repository>,
    config: &EngineConfig,
    profiles: &[SourceProfile],
    limit: usize,
) -> Result<(), Box<dyn Error>> {
    let runner = RoutineRunner::new(fetcher, repository, config);
    let owners: Vec<OwnerId> = profiles.iter().map(|p| p.owner_id).unique().collect();

    for owner in owners {
        let owned: Vec<SourceProfile> = profiles
            .iter()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect();
        let report = runner.run(&owned, limit, owner).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

struct HistoricalPlan {
    from_days: u32,
    to_days: u32,
    url_cap: usize,
    owner: Option<OwnerId>,
    concurrency: usize,
}

/// Historical runs for every selected source, `plan.concurrency` at a time.
/// Ctrl-C stops each run after its current item.
async fn run_historical(
    fetcher: Arc<dyn PageFetcher>,
    repository: Arc<dyn Repository>,
    config: &EngineConfig,
    profiles: &[SourceProfile],
    plan: HistoricalPlan,
) -> Result<(), Box<dyn Error>> {
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current item");
                cancel.cancel();
            }
        });
    }

    let ingestor = HistoricalIngestor::new(fetcher, repository, config);
    info!(
        sources = profiles.len(),
        from_days = plan.from_days,
        to_days = plan.to_days,
        url_cap = plan.url_cap,
        concurrency = plan.concurrency,
        "Starting historical backfill"
    );

    let outcomes: Vec<SourceOutcome> = stream::iter(profiles.iter())
        .map(|profile| {
            let ingestor = &ingestor;
            let cancel = &cancel;
            let plan = &plan;
            async move {
                let owner = plan.owner.unwrap_or(profile.owner_id);
                let stats = ingestor
                    .run(profile, plan.from_days, plan.to_days, plan.url_cap, owner, cancel)
                    .await;
                SourceOutcome {
                    source: profile.name.clone(),
                    stats,
                }
            }
        })
        .buffer_unordered(plan.concurrency)
        .collect()
        .await;

    let failed = outcomes.iter().filter(|o| !o.stats.is_success()).count();
    let saved: usize = outcomes.iter().map(|o| o.stats.newly_saved).sum();
    info!(
        sources = outcomes.len(),
        failed,
        saved,
        cancelled = cancel.is_cancelled(),
        "Historical backfill finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}
