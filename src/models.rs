//! Data models for source profiles, extracted articles and crawl bookkeeping.
//!
//! This module defines the core data structures used throughout the engine:
//! - [`SourceProfile`]: per-source configuration with six element matchers
//! - [`Article`]: an extracted news item, ready to hand to a repository
//! - [`DeepPage`]: the nullable fields recovered from a single article page
//! - [`SitemapEntry`] and [`CrawlWindow`]: sitemap crawl inputs
//! - [`IngestStats`] and [`RoutineReport`]: run accounting

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies the account that owns a source and its stored articles.
pub type OwnerId = i64;

/// Title used when no strategy produced a usable headline.
pub const UNTITLED: &str = "Untitled";

/// Summary used when no strategy produced usable text.
pub const NO_SUMMARY: &str = "No summary";

/// Summaries are cut to this many characters.
pub const MAX_SUMMARY_CHARS: usize = 500;

/// How a single attribute of a candidate element is tested.
///
/// In YAML profiles this is written as a plain string (exact match), `true`
/// (attribute must be present) or `{ pattern: "<regex>" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Present(bool),
    Exact(String),
    Pattern { pattern: String },
}

/// A small matcher value: an optional tag name plus attribute filters.
///
/// Interpreted by [`crate::extract::matcher::ElementMatcher`], the single
/// "find matching elements" primitive used for every source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorSpec {
    #[serde(default, alias = "name")]
    pub tag: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl SelectorSpec {
    pub fn tag(name: &str) -> Self {
        Self {
            tag: Some(name.to_string()),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }
}

fn default_link_selector() -> Option<SelectorSpec> {
    Some(SelectorSpec::tag("a"))
}

fn default_image_selector() -> Option<SelectorSpec> {
    Some(SelectorSpec::tag("img"))
}

/// The six per-source matchers used by listing extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub container: SelectorSpec,
    pub title: SelectorSpec,
    pub summary: SelectorSpec,
    #[serde(default = "default_link_selector")]
    pub link: Option<SelectorSpec>,
    #[serde(default = "default_image_selector")]
    pub image: Option<SelectorSpec>,
    #[serde(default)]
    pub category: Option<SelectorSpec>,
}

fn default_active() -> bool {
    true
}

/// A configured origin site. Read-only for the duration of a crawl call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub selectors: SelectorSet,
    pub owner_id: OwnerId,
}

/// An extracted news item.
///
/// Built fresh per extraction, handed to a repository, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// Absolute article URL.
    pub url: String,
    /// At most [`MAX_SUMMARY_CHARS`] characters.
    pub summary: String,
    pub image_url: Option<String>,
    /// Normalized category, if any strategy produced an acceptable one.
    pub category: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub source_id: i64,
    pub source_name: String,
}

impl Article {
    pub fn has_placeholder_title(&self) -> bool {
        self.title == UNTITLED
    }
}

/// Fields recovered from one article page. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeepPage {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
}

impl DeepPage {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.image_url.is_none()
            && self.publish_date.is_none()
    }
}

/// One `<url>` record from a sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitemapEntry {
    pub url: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// The `[from, to]` range bounding a historical backfill.
///
/// `to` always sits at least a configured buffer before "now", so a backfill
/// never races live scraping over the same fresh URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl CrawlWindow {
    pub fn new(
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<Self> {
        if from >= to {
            return Err(Error::InvalidWindow(format!(
                "start {from} is not before end {to}"
            )));
        }
        if to >= now || now - to < buffer {
            return Err(Error::InvalidWindow(format!(
                "end {to} is within {buffer} of now ({now})"
            )));
        }
        Ok(Self { from, to })
    }

    /// `[now - from_days, now - to_days]`, with `to_days` strictly positive.
    pub fn days_ago(
        from_days: u32,
        to_days: u32,
        now: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<Self> {
        if to_days == 0 {
            return Err(Error::InvalidWindow(
                "window must end at least one day before now".to_string(),
            ));
        }
        Self::new(
            now - Duration::days(i64::from(from_days)),
            now - Duration::days(i64::from(to_days)),
            now,
            buffer,
        )
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// Inclusive on both ends.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }
}

/// Terminal state of a historical run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    #[default]
    Completed,
    Cancelled,
    Failed(String),
}

/// Counters for one historical run. Mutated while the run is in flight,
/// returned by value once it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub total_urls: usize,
    pub already_existed: usize,
    pub newly_saved: usize,
    pub errors: usize,
    pub status: RunStatus,
}

impl IngestStats {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed(reason.into()),
            ..Self::default()
        }
    }

    /// Items that reached a terminal outcome.
    pub fn processed(&self) -> usize {
        self.already_existed + self.newly_saved + self.errors
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, RunStatus::Failed(_))
    }
}

/// Accounting for a routine (listing page) run over several sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutineReport {
    pub sources: usize,
    pub failed_sources: Vec<String>,
    pub extracted: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub errors: usize,
}
