//! Routine runs: scrape every active source's listing page and store what
//! comes out.
//!
//! Sources are processed one after another with a pause between them. A
//! source whose listing page cannot be fetched is recorded and skipped; it
//! never aborts the run.

use crate::config::EngineConfig;
use crate::error::StorageError;
use crate::fetch::PageFetcher;
use crate::models::{OwnerId, RoutineReport, SourceProfile};
use crate::repository::Repository;
use crate::scrapers::listing::ListingExtractor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub struct RoutineRunner {
    listing: ListingExtractor,
    repository: Arc<dyn Repository>,
    source_delay: Duration,
}

impl RoutineRunner {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        repository: Arc<dyn Repository>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            listing: ListingExtractor::new(fetcher, config),
            repository,
            source_delay: config.source_delay(),
        }
    }

    #[instrument(level = "info", skip_all, fields(profiles = profiles.len(), limit = limit, owner = owner))]
    pub async fn run(&self, profiles: &[SourceProfile], limit: usize, owner: OwnerId) -> RoutineReport {
        let t0 = Instant::now();
        let mut report = RoutineReport::default();

        for profile in profiles.iter().filter(|p| p.active) {
            if report.sources > 0 {
                sleep(self.source_delay).await;
            }
            report.sources += 1;

            let articles = match self.listing.scrape_source(profile, limit).await {
                Ok(articles) => articles,
                Err(e) => {
                    warn!(source = %profile.name, error = %e, "Listing scrape failed; skipping source");
                    report.failed_sources.push(profile.name.clone());
                    continue;
                }
            };
            report.extracted += articles.len();

            for article in &articles {
                match self.repository.save(article, owner).await {
                    Ok(id) => {
                        debug!(url = %article.url, id, "Saved");
                        report.saved += 1;
                    }
                    Err(StorageError::UniqueViolation) => {
                        debug!(url = %article.url, "Already stored");
                        report.duplicates += 1;
                    }
                    Err(e) => {
                        warn!(url = %article.url, error = %e, "Save failed");
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            sources = report.sources,
            failed = report.failed_sources.len(),
            extracted = report.extracted,
            saved = report.saved,
            duplicates = report.duplicates,
            errors = report.errors,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Routine run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StubFetcher;
    use crate::models::{AttrValue, SelectorSet, SelectorSpec};
    use crate::repository::InMemoryRepository;

    fn profile(id: i64, name: &str, base_url: &str, active: bool) -> SourceProfile {
        SourceProfile {
            id,
            name: name.to_string(),
            base_url: base_url.to_string(),
            active,
            selectors: SelectorSet {
                container: SelectorSpec::tag("li").with_attr("class", AttrValue::Exact("item".into())),
                title: SelectorSpec::tag("h2"),
                summary: SelectorSpec::tag("p"),
                link: Some(SelectorSpec::tag("a")),
                image: Some(SelectorSpec::tag("img")),
                category: None,
            },
            owner_id: 1,
        }
    }

    const LISTING: &str = r#"
        <html><body><ul>
          <li class="item">
            <h2>Harbour reopens after repairs</h2>
            <p>The port resumed operations following a month of work on the breakwater.</p>
            <a href="/harbour"><img src="/harbour.jpg"></a>
          </li>
          <li class="item">
            <h2>Library extends opening hours</h2>
            <p>Branches will stay open until nine on weekdays starting next month.</p>
            <a href="/library"><img src="/library.jpg"></a>
          </li>
        </ul></body></html>
    "#;

    #[tokio::test]
    async fn test_run_saves_and_counts_duplicates() {
        let stub = Arc::new(
            StubFetcher::new()
                .with_page("https://one.example/", LISTING)
                .with_page("https://two.example/", LISTING),
        );
        let repo = Arc::new(InMemoryRepository::new());
        let runner = RoutineRunner::new(stub.clone(), repo.clone(), &EngineConfig::without_delays());
        let profiles = vec![
            profile(1, "One", "https://one.example/", true),
            profile(2, "Down", "https://down.example/", true),
            profile(3, "Paused", "https://paused.example/", false),
            profile(4, "Two", "https://two.example/", true),
        ];

        let report = runner.run(&profiles, 5, 1).await;
        assert_eq!(report.sources, 3);
        assert_eq!(report.failed_sources, vec!["Down".to_string()]);
        assert_eq!(report.extracted, 4);
        assert_eq!(report.saved, 4);
        assert_eq!(report.duplicates, 0);
        assert!(!stub.requests().iter().any(|r| r.contains("paused.example")));

        let again = runner.run(&profiles[..1], 5, 1).await;
        assert_eq!(again.saved, 0);
        assert_eq!(again.duplicates, 2);
        assert_eq!(repo.count_for_owner(1).await.unwrap(), 4);
    }
}
