//! Sitemap discovery and traversal (sitemaps.org 0.9).
//!
//! A sitemap index is expanded with an explicit worklist rather than
//! recursion: depth is capped by `max_sitemap_depth` and every sitemap URL is
//! visited at most once, so self-referencing or cyclic indexes terminate.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::extract::dates::parse_iso_instant;
use crate::fetch::{PageFetcher, RetryPolicy, fetch_with_backoff};
use crate::models::{CrawlWindow, SitemapEntry};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Conventional locations probed before falling back to `robots.txt`.
const CONVENTIONAL_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/news-sitemap.xml"];

/// Either a `<sitemapindex>` or a `<urlset>`; the root element name is not
/// checked, only which children are present.
#[derive(Debug, Default, Deserialize)]
struct SitemapDocument {
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<SitemapRef>,
    #[serde(rename = "url", default)]
    urls: Vec<UrlRecord>,
}

#[derive(Debug, Deserialize)]
struct SitemapRef {
    #[serde(default)]
    loc: String,
}

#[derive(Debug, Deserialize)]
struct UrlRecord {
    #[serde(default)]
    loc: String,
    #[serde(default)]
    lastmod: Option<String>,
}

fn parse_document(xml: &str) -> Result<SitemapDocument> {
    from_str(xml.trim_start_matches('\u{feff}')).map_err(|e| Error::Parse(format!("sitemap: {e}")))
}

/// Inclusion rule: no window keeps everything; with a window, an entry
/// without `lastmod` cannot be shown to be in range and is dropped.
pub fn in_window(entry: &SitemapEntry, window: Option<&CrawlWindow>) -> bool {
    match (window, entry.last_modified) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(w), Some(at)) => w.contains(at),
    }
}

pub struct SitemapCrawler {
    fetcher: Arc<dyn PageFetcher>,
    max_depth: usize,
    retry: RetryPolicy,
}

impl SitemapCrawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &EngineConfig) -> Self {
        Self {
            fetcher,
            max_depth: config.max_sitemap_depth,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Every page entry reachable from `sitemap_url` that passes
    /// [`in_window`], in document order.
    ///
    /// Only the root document is run-critical: its fetch is retried and its
    /// failure is returned. Child sitemaps that fail are logged and skipped.
    #[instrument(level = "info", skip_all, fields(sitemap = %sitemap_url))]
    pub async fn list_entries(
        &self,
        sitemap_url: &str,
        window: Option<&CrawlWindow>,
    ) -> Result<Vec<SitemapEntry>> {
        let root_body = fetch_with_backoff(self.fetcher.as_ref(), sitemap_url, self.retry).await?;
        let root = parse_document(&root_body)?;

        let mut seen: HashSet<String> = HashSet::from([sitemap_url.to_string()]);
        let mut entries = Vec::new();
        let mut skipped_by_window = 0usize;
        // (document, depth); the root sits at depth 1.
        let mut worklist: Vec<(SitemapDocument, usize)> = vec![(root, 1)];

        while let Some((doc, depth)) = worklist.pop() {
            for record in doc.urls {
                let loc = record.loc.trim();
                if loc.is_empty() {
                    continue;
                }
                let entry = SitemapEntry {
                    url: loc.to_string(),
                    last_modified: record.lastmod.as_deref().and_then(parse_iso_instant),
                };
                if in_window(&entry, window) {
                    entries.push(entry);
                } else {
                    skipped_by_window += 1;
                }
            }

            let mut children = Vec::new();
            for child in doc.sitemaps {
                let loc = child.loc.trim().to_string();
                if loc.is_empty() {
                    continue;
                }
                if depth >= self.max_depth {
                    warn!(child = %loc, depth, max = self.max_depth, "Sitemap depth limit reached; not expanding");
                    continue;
                }
                if !seen.insert(loc.clone()) {
                    debug!(child = %loc, "Sitemap already visited");
                    continue;
                }
                match self.fetch_child(&loc).await {
                    Some(child_doc) => children.push((child_doc, depth + 1)),
                    None => continue,
                }
            }
            // Reverse so children are processed in document order.
            worklist.extend(children.into_iter().rev());
        }

        info!(
            entries = entries.len(),
            skipped_by_window,
            sitemaps = seen.len(),
            "Listed sitemap entries"
        );
        Ok(entries)
    }

    async fn fetch_child(&self, url: &str) -> Option<SitemapDocument> {
        let body = match self.fetcher.get_text(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(child = %url, error = %e, "Child sitemap fetch failed; skipping");
                return None;
            }
        };
        match parse_document(&body) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(child = %url, error = %e, "Child sitemap parse failed; skipping");
                None
            }
        }
    }

    /// Locate a site's sitemap: HEAD-probe the conventional paths, then read
    /// `Sitemap:` from `robots.txt`.
    #[instrument(level = "info", skip_all, fields(base = %base_url))]
    pub async fn discover_sitemap(&self, base_url: &str) -> Option<String> {
        let base = match Url::parse(base_url) {
            Ok(base) => base,
            Err(e) => {
                warn!(error = %e, "Invalid base URL; cannot discover sitemap");
                return None;
            }
        };

        for path in CONVENTIONAL_PATHS {
            let Ok(candidate) = base.join(path) else {
                continue;
            };
            match self.fetcher.probe(candidate.as_str()).await {
                Ok(200) => {
                    info!(sitemap = %candidate, "Found sitemap at conventional path");
                    return Some(candidate.to_string());
                }
                Ok(status) => debug!(candidate = %candidate, status, "Probe missed"),
                Err(e) => debug!(candidate = %candidate, error = %e, "Probe failed"),
            }
        }

        let robots_url = base.join("/robots.txt").ok()?;
        let robots = match self.fetcher.get_text(robots_url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "No sitemap found and robots.txt unavailable");
                return None;
            }
        };
        let found = sitemap_from_robots(&robots);
        match &found {
            Some(url) => info!(sitemap = %url, "Found sitemap in robots.txt"),
            None => warn!("No sitemap found"),
        }
        found
    }
}

/// First `Sitemap:` directive in a robots.txt body, matched case-insensitively.
fn sitemap_from_robots(robots: &str) -> Option<String> {
    robots.lines().find_map(|line| {
        let line = line.trim();
        let (key, value) = line.split_once(':')?;
        if !key.trim().eq_ignore_ascii_case("sitemap") {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
