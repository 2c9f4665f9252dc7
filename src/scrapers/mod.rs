//! Scrapers that turn fetched pages into articles.
//!
//! The engine has two entry points, each built from the same parts:
//!
//! 1. **Routine**: fetch each source's listing page, extract teasers, and
//!    escalate thin ones to their article pages
//! 2. **Historical**: discover a source's sitemap, list pages inside a crawl
//!    window, and ingest each page not already stored
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`listing`] | teaser blocks to articles, with per-field fallback chains |
//! | [`deep`] | one article page to optional fields |
//! | [`sitemap`] | sitemap discovery and bounded index expansion |
//! | [`historical`] | windowed, cancellable, deduplicating backfill |
//! | [`routine`] | listing scrape across all active sources |
//!
//! Per-item failures are logged and absorbed everywhere; only a listing page
//! or root sitemap that cannot be fetched fails a run.

pub mod deep;
pub mod historical;
pub mod listing;
pub mod routine;
pub mod sitemap;
