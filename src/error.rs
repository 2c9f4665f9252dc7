//! Error types shared across the extraction and crawl engine.
//!
//! Most failures inside a run are absorbed into degraded output (a field
//! becomes `None`, a counter is bumped). The variants here are what is left
//! when a caller genuinely needs to know something went wrong: a listing page
//! that could not be fetched, a sitemap that could not be parsed, a profile
//! whose selectors do not compile.

use thiserror::Error;

/// Engine-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Timeout, connection reset, DNS failure and friends.
    #[error("network failure fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// The origin answered, but not with a success status.
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    /// Malformed HTML, XML or date input.
    #[error("parse failure: {0}")]
    Parse(String),

    /// A source profile carries a matcher that cannot be compiled.
    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid crawl window: {0}")]
    InvalidWindow(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a [`crate::repository::Repository`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The `(url, owner)` pair is already stored.
    #[error("article already stored for this owner")]
    UniqueViolation,

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
