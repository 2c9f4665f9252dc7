//! Command-line interface definitions for News Harvester.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Global options can also be provided via environment variables.

use clap::{Parser, Subcommand};

/// Command-line arguments for the News Harvester engine.
///
/// # Examples
///
/// ```sh
/// # Scrape listing pages of every active source
/// news_harvester scrape -p sources.yaml
///
/// # Backfill two weeks of sitemap history, three sources at a time
/// news_harvester --store ./data/articles.json historical -p sources.yaml --concurrency 3
///
/// # Find and inspect a site's sitemap
/// news_harvester discover https://www.example.com
/// news_harvester sitemap https://www.example.com/sitemap.xml --from-days 10 --to-days 2
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true, env = "NEWS_HARVESTER_CONFIG")]
    pub config: Option<String>,

    /// JSON file used as the article store
    #[arg(short, long, global = true, default_value = "articles.json")]
    pub store: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Scrape the listing page of every active source profile
    Scrape {
        /// YAML file with source profiles
        #[arg(short, long)]
        profiles: String,

        /// Maximum articles per source (config default when omitted)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Backfill articles from source sitemaps within a crawl window
    Historical {
        /// YAML file with source profiles
        #[arg(short, long)]
        profiles: String,

        /// Only backfill the source with this id
        #[arg(long)]
        source: Option<i64>,

        /// Window start, in days before now
        #[arg(long)]
        from_days: Option<u32>,

        /// Window end, in days before now (must be at least 1)
        #[arg(long)]
        to_days: Option<u32>,

        /// Maximum sitemap URLs ingested per source
        #[arg(long)]
        url_cap: Option<usize>,

        /// Store articles for this owner instead of each profile's own
        #[arg(long)]
        owner: Option<i64>,

        /// Sources backfilled at the same time
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },

    /// Print the sitemap URL discovered for a site
    Discover {
        /// Site base URL
        base_url: String,
    },

    /// List the entries of a sitemap, optionally within a crawl window
    Sitemap {
        /// Sitemap or sitemap index URL
        url: String,

        /// Window start, in days before now
        #[arg(long)]
        from_days: Option<u32>,

        /// Window end, in days before now
        #[arg(long)]
        to_days: Option<u32>,
    },
}
