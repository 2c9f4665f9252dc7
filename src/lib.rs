//! # News Harvester
//!
//! An extraction and crawl engine that pulls structured news items (title,
//! summary, image, category, publish date) out of heterogeneous, often
//! malformed HTML across many independently configured sites, and backfills
//! historical coverage by walking each site's sitemap within a bounded time
//! window.
//!
//! ## Features
//!
//! - Per-source selector profiles backed by layered fallback heuristics, so
//!   a profile that has drifted out of date still yields articles
//! - Conditional escalation from listing teasers to article pages for
//!   missing fields, with a politeness delay between requests
//! - Category validation and canonicalization
//! - Sitemap discovery and bounded, cycle-safe sitemap index expansion
//! - Cancellable, deduplicating historical ingest with per-item accounting
//!
//! ## Architecture
//!
//! 1. **Fetching** ([`fetch`]): outbound HTTP behind [`fetch::PageFetcher`]
//! 2. **Extraction** ([`extract`]): pure helpers over parsed documents
//! 3. **Scraping** ([`scrapers`]): listing, deep page, sitemap, routine and
//!    historical runs
//! 4. **Storage** ([`repository`], [`outputs`]): the narrow persistence seam
//!    and a JSON file store

pub mod cancel;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod outputs;
pub mod repository;
pub mod scrapers;
pub mod utils;

pub use error::{Error, Result, StorageError};
