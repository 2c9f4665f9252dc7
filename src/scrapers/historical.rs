//! Sitemap-driven historical backfill.
//!
//! Walks a source's sitemap for pages last modified inside a crawl window
//! that ends safely before "now", and ingests the ones not already stored
//! for the owner. One page at a time, with a politeness delay between
//! fetches. The run checks its [`CancelFlag`] between items and always
//! returns counters, never an error.
//!
//! # Per-item outcome
//!
//! | Situation | Counter |
//! |-----------|---------|
//! | already stored for the owner | `already_existed` |
//! | page yields no title | `errors` |
//! | saved | `newly_saved` |
//! | save hit a uniqueness conflict | `already_existed` |
//! | save failed otherwise | `errors` |

use crate::cancel::CancelFlag;
use crate::config::EngineConfig;
use crate::error::StorageError;
use crate::fetch::PageFetcher;
use crate::models::{
    Article, CrawlWindow, IngestStats, MAX_SUMMARY_CHARS, NO_SUMMARY, OwnerId, RunStatus,
    SitemapEntry, SourceProfile,
};
use crate::repository::Repository;
use crate::scrapers::deep::DeepPageExtractor;
use crate::scrapers::sitemap::SitemapCrawler;
use crate::utils::truncate_chars;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Progress is logged every this many items.
const PROGRESS_EVERY: usize = 50;

pub struct HistoricalIngestor {
    sitemaps: SitemapCrawler,
    deep: DeepPageExtractor,
    repository: Arc<dyn Repository>,
    politeness_delay: Duration,
    window_buffer: chrono::Duration,
}

/// Whether an item cost an outbound request, and so earns a pause.
enum ItemOutcome {
    Skipped,
    Fetched,
}

impl HistoricalIngestor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        repository: Arc<dyn Repository>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            sitemaps: SitemapCrawler::new(fetcher.clone(), config),
            deep: DeepPageExtractor::new(fetcher),
            repository,
            politeness_delay: config.politeness_delay(),
            window_buffer: config.window_buffer(),
        }
    }

    /// Backfill `source` over `[now - from_days, now - to_days]`, capped at
    /// `url_cap` pages, storing for `owner`.
    #[instrument(level = "info", skip_all, fields(source = %source.name, from_days = from_days, to_days = to_days, url_cap = url_cap, owner = owner))]
    pub async fn run(
        &self,
        source: &SourceProfile,
        from_days: u32,
        to_days: u32,
        url_cap: usize,
        owner: OwnerId,
        cancel: &CancelFlag,
    ) -> IngestStats {
        let window = match CrawlWindow::days_ago(from_days, to_days, Utc::now(), self.window_buffer) {
            Ok(window) => window,
            Err(e) => {
                warn!(error = %e, "Rejected crawl window");
                return IngestStats::failed("invalid window");
            }
        };
        self.run_window(source, &window, url_cap, owner, cancel).await
    }

    /// [`HistoricalIngestor::run`] over an explicit window.
    pub async fn run_window(
        &self,
        source: &SourceProfile,
        window: &CrawlWindow,
        url_cap: usize,
        owner: OwnerId,
        cancel: &CancelFlag,
    ) -> IngestStats {
        let t0 = Instant::now();

        let Some(sitemap_url) = self.sitemaps.discover_sitemap(&source.base_url).await else {
            warn!("No sitemap for source; nothing to backfill");
            return IngestStats::failed("no sitemap");
        };

        let mut entries = match self.sitemaps.list_entries(&sitemap_url, Some(window)).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(sitemap = %sitemap_url, error = %e, "Sitemap unreadable");
                return IngestStats::failed(format!("sitemap unreadable: {e}"));
            }
        };
        if entries.is_empty() {
            info!(from = %window.from(), to = %window.to(), "No sitemap URLs in window");
            return IngestStats::failed("no URLs in window");
        }
        entries.truncate(url_cap);

        let mut stats = IngestStats {
            total_urls: entries.len(),
            ..IngestStats::default()
        };
        info!(total = stats.total_urls, sitemap = %sitemap_url, "Starting historical ingest");

        for (i, entry) in entries.iter().enumerate() {
            if cancel.is_cancelled() {
                stats.status = RunStatus::Cancelled;
                info!(processed = stats.processed(), total = stats.total_urls, "Historical ingest cancelled");
                break;
            }

            let outcome = self.ingest_entry(entry, source, owner, &mut stats).await;

            if (i + 1) % PROGRESS_EVERY == 0 {
                info!(
                    done = i + 1,
                    total = stats.total_urls,
                    saved = stats.newly_saved,
                    existed = stats.already_existed,
                    errors = stats.errors,
                    "Historical ingest progress"
                );
            }
            if matches!(outcome, ItemOutcome::Fetched) {
                sleep(self.politeness_delay).await;
            }
        }

        info!(
            total = stats.total_urls,
            saved = stats.newly_saved,
            existed = stats.already_existed,
            errors = stats.errors,
            status = ?stats.status,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Historical ingest finished"
        );
        stats
    }

    async fn ingest_entry(
        &self,
        entry: &SitemapEntry,
        source: &SourceProfile,
        owner: OwnerId,
        stats: &mut IngestStats,
    ) -> ItemOutcome {
        match self.repository.exists_by_url_and_owner(&entry.url, owner).await {
            Ok(true) => {
                debug!(url = %entry.url, "Already stored");
                stats.already_existed += 1;
                return ItemOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => warn!(url = %entry.url, error = %e, "Existence check failed; fetching anyway"),
        }

        let page = self.deep.extract(&entry.url, None).await;
        let Some(title) = page.title else {
            warn!(url = %entry.url, "No title recovered");
            stats.errors += 1;
            return ItemOutcome::Fetched;
        };

        let article = Article {
            title,
            url: entry.url.clone(),
            summary: page
                .summary
                .map(|s| truncate_chars(&s, MAX_SUMMARY_CHARS))
                .unwrap_or_else(|| NO_SUMMARY.to_string()),
            image_url: page.image_url,
            category: None,
            publish_date: page.publish_date.or(entry.last_modified),
            source_id: source.id,
            source_name: source.name.clone(),
        };

        match self.repository.save(&article, owner).await {
            Ok(id) => {
                debug!(url = %entry.url, id, "Saved");
                stats.newly_saved += 1;
            }
            Err(StorageError::UniqueViolation) => {
                debug!(url = %entry.url, "Stored concurrently by another writer");
                stats.already_existed += 1;
            }
            Err(e) => {
                warn!(url = %entry.url, error = %e, "Save failed");
                stats.errors += 1;
            }
        }
        ItemOutcome::Fetched
    }
}
