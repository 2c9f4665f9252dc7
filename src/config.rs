//! Engine configuration and source profile loading.
//!
//! Every field has a default, so a missing config file (or a partial one)
//! still yields a usable [`EngineConfig`]. Politeness parameters live here
//! rather than as constants so operators can slow the engine down for
//! fragile origins.

use crate::error::{Error, Result};
use crate::models::SourceProfile;
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Fixed desktop User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub user_agent: String,
    pub document_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Pause after each deep-page fetch and after each historical item.
    pub politeness_delay_ms: u64,
    /// Pause between sources during a routine run.
    pub source_delay_ms: u64,
    pub max_sitemap_depth: usize,
    /// A crawl window must end at least this many days before now.
    pub min_window_buffer_days: u32,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub default_listing_limit: usize,
    pub default_from_days: u32,
    pub default_to_days: u32,
    pub default_url_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            document_timeout_secs: 15,
            probe_timeout_secs: 5,
            politeness_delay_ms: 300,
            source_delay_ms: 2000,
            max_sitemap_depth: 5,
            min_window_buffer_days: 1,
            max_retries: 2,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            default_listing_limit: 5,
            default_from_days: 15,
            default_to_days: 3,
            default_url_cap: 500,
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file, or fall back to defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        info!(path, "Loaded engine configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sitemap_depth == 0 {
            return Err(Error::Config("max_sitemap_depth must be at least 1".into()));
        }
        if self.min_window_buffer_days == 0 {
            return Err(Error::Config(
                "min_window_buffer_days must be at least 1".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user_agent must not be empty".into()));
        }
        Ok(())
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn window_buffer(&self) -> ChronoDuration {
        ChronoDuration::days(i64::from(self.min_window_buffer_days))
    }

    /// Same configuration with every pause set to zero.
    #[cfg(test)]
    pub(crate) fn without_delays() -> Self {
        Self {
            politeness_delay_ms: 0,
            source_delay_ms: 0,
            retry_base_delay_ms: 0,
            retry_max_delay_ms: 0,
            ..Self::default()
        }
    }
}

/// Load a YAML list of source profiles.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_profiles(path: impl AsRef<Path>) -> Result<Vec<SourceProfile>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let profiles: Vec<SourceProfile> = serde_yaml::from_str(&raw)?;
    info!(count = profiles.len(), "Loaded source profiles");
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: EngineConfig =
            serde_yaml::from_str("politeness_delay_ms: 1000\nmax_sitemap_depth: 3\n").unwrap();
        assert_eq!(config.politeness_delay(), Duration::from_millis(1000));
        assert_eq!(config.max_sitemap_depth, 3);
        assert_eq!(config.document_timeout(), Duration::from_secs(15));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        assert_eq!(EngineConfig::load(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = EngineConfig {
            max_sitemap_depth: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_profiles_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
- id: 1
  name: BBC News
  base_url: https://www.bbc.com/news
  selectors:
    container: {{ tag: div, attrs: {{ data-testid: card-text-wrapper }} }}
    title: {{ tag: h2 }}
    summary: {{ tag: p }}
    category: {{ tag: span, attrs: {{ class: category }} }}
  owner_id: 2
- id: 2
  name: CNN
  base_url: https://edition.cnn.com
  active: false
  selectors:
    container: {{ tag: div, attrs: {{ class: container__item }} }}
    title: {{ tag: span, attrs: {{ class: container__headline-text }} }}
    summary: {{ tag: div, attrs: {{ class: container__description }} }}
  owner_id: 2
"#
        )
        .unwrap();

        let profiles = load_profiles(file.path()).unwrap();
        assert_eq!(profiles.len(), 2);
        assert!(profiles[0].active);
        assert!(!profiles[1].active);
        assert_eq!(profiles[1].name, "CNN");
    }
}
