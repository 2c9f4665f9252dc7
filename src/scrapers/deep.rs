//! Single article page extraction.
//!
//! Fetches one article's own page and recovers the fields a listing teaser
//! tends to lack. Every field is optional and the whole thing is best
//! effort: a page that cannot be fetched yields an empty [`DeepPage`], never
//! an error.
//!
//! # Field Sources
//!
//! | Field | Order tried |
//! |-------|-------------|
//! | title | `og:title`/`twitter:title` meta, first `<h1>`, `<title>` minus site suffix, caller hint |
//! | image | `og:image`/`twitter:image` meta, featured-image classes, images in the article body |
//! | summary | description meta, first body paragraph, lead/intro classes |
//! | date | `published_time` meta, `<time datetime>`, date-like classes |

use crate::extract::dates::{parse_iso_instant, parse_loose_date};
use crate::extract::images::{absolutize_image, is_valid_image_url, looks_decorative, resolve_img};
use crate::extract::matcher::{ElementMatcher, attr_text, char_len, element_text};
use crate::fetch::PageFetcher;
use crate::models::{DeepPage, MAX_SUMMARY_CHARS};
use crate::utils::{looks_like_byline, truncate_chars};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const FEATURED_IMAGE_CLASSES: &[&str] = &[
    "featured-image",
    "main-image",
    "article-image",
    "post-image",
    "hero-image",
    "principal",
];

const LEAD_CLASSES: &[&str] = &[
    "lead",
    "intro",
    "summary",
    "excerpt",
    "abstract",
    "preview",
    "description",
];

const DATE_CLASSES: &[&str] = &["date", "fecha", "published", "pub-date", "time", "timestamp"];

static BODY_CONTAINER_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)content|article|post").expect("static regex"));

/// Fetches and parses article pages.
#[derive(Clone)]
pub struct DeepPageExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl DeepPageExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch `url` and extract what it offers. `title_hint` is returned as
    /// the title when the page has none of its own.
    #[instrument(level = "info", skip_all, fields(url = %url))]
    pub async fn extract(&self, url: &str, title_hint: Option<&str>) -> DeepPage {
        let body = match self.fetcher.get_text(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Deep page fetch failed; leaving fields empty");
                return DeepPage::default();
            }
        };
        let page = parse_deep_page(&body, url, title_hint);
        debug!(
            title = page.title.is_some(),
            summary = page.summary.is_some(),
            image = page.image_url.is_some(),
            date = page.publish_date.is_some(),
            "Parsed deep page"
        );
        page
    }
}

/// Parse an already fetched article page.
pub fn parse_deep_page(html: &str, page_url: &str, title_hint: Option<&str>) -> DeepPage {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    DeepPage {
        title: page_title(root).or_else(|| {
            title_hint
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
        }),
        summary: page_summary(root),
        image_url: page_image(root, page_url),
        publish_date: page_date(root),
    }
}

/// First non-empty `content` of a `<meta>` whose `property` or `name`
/// contains one of `keys`, trying keys in order.
fn meta_content(root: ElementRef<'_>, keys: &[&str]) -> Option<String> {
    let metas = ElementMatcher::tag("meta").find_all(root);
    keys.iter().find_map(|key| {
        metas.iter().find_map(|meta| {
            let named = ["property", "name"].iter().any(|attr| {
                meta.value()
                    .attr(attr)
                    .is_some_and(|v| v.to_lowercase().contains(key))
            });
            if named { attr_text(meta, "content") } else { None }
        })
    })
}

fn page_title(root: ElementRef<'_>) -> Option<String> {
    if let Some(title) = meta_content(root, &["og:title", "twitter:title"]) {
        return Some(title);
    }

    if let Some(h1) = ElementMatcher::tag("h1").find_first(root) {
        let text = element_text(&h1);
        if char_len(&text) > 10 {
            return Some(text);
        }
    }

    let raw = element_text(&ElementMatcher::tag("title").find_first(root)?);
    let stripped = strip_site_suffix(&raw);
    (char_len(&stripped) > 10).then_some(stripped)
}

/// `"Headline | Site"` and `"Headline - Section - Site"` become `"Headline"`.
fn strip_site_suffix(raw: &str) -> String {
    let head = raw.split('|').next().unwrap_or(raw);
    let dashed: Vec<&str> = head.split('-').collect();
    let head = if dashed.len() > 2 { dashed[0] } else { head };
    head.trim().to_string()
}

/// `<article>`, then `<main>`, then a content-ish `<div>`.
fn body_container(root: ElementRef<'_>) -> Option<ElementRef<'_>> {
    ElementMatcher::tag("article")
        .find_first(root)
        .or_else(|| ElementMatcher::tag("main").find_first(root))
        .or_else(|| {
            ElementMatcher::tag("div")
                .attr_matches("class", &BODY_CONTAINER_CLASS)
                .find_first(root)
        })
}

fn page_image(root: ElementRef<'_>, page_url: &str) -> Option<String> {
    if let Some(src) = meta_content(root, &["og:image", "twitter:image"]) {
        if is_valid_image_url(&src) {
            if let Some(url) = absolutize_image(page_url, &src) {
                return Some(url);
            }
        }
    }

    let featured = FEATURED_IMAGE_CLASSES.iter().find_map(|class| {
        ElementMatcher::tag("img")
            .attr_contains("class", class)
            .find_all(root)
            .into_iter()
            .find_map(|img| resolve_img(&img, page_url))
    });
    if featured.is_some() {
        return featured;
    }

    let container = body_container(root)?;
    ElementMatcher::tag("img")
        .find_all(container)
        .into_iter()
        .take(5)
        .filter_map(|img| resolve_img(&img, page_url))
        .find(|url| !looks_decorative(url))
}

fn page_summary(root: ElementRef<'_>) -> Option<String> {
    let meta = ElementMatcher::tag("meta")
        .find_all(root)
        .into_iter()
        .find_map(|meta| {
            let is_description = meta
                .value()
                .attr("name")
                .is_some_and(|n| n.eq_ignore_ascii_case("description"))
                || meta
                    .value()
                    .attr("property")
                    .is_some_and(|p| p.eq_ignore_ascii_case("og:description"));
            if is_description { attr_text(&meta, "content") } else { None }
        })
        .filter(|d| char_len(d) > 20);
    if let Some(description) = meta {
        return Some(truncate_chars(&description, MAX_SUMMARY_CHARS));
    }

    if let Some(container) = body_container(root) {
        let paragraph = ElementMatcher::tag("p")
            .find_all(container)
            .into_iter()
            .map(|p| element_text(&p))
            .find(|text| {
                let len = char_len(text);
                len > 50 && len < 1000 && !looks_like_byline(text)
            });
        if let Some(text) = paragraph {
            return Some(truncate_chars(&text, MAX_SUMMARY_CHARS));
        }
    }

    LEAD_CLASSES.iter().find_map(|class| {
        ElementMatcher::tag("div")
            .attr_contains("class", class)
            .find_all(root)
            .into_iter()
            .map(|div| element_text(&div))
            .find(|text| char_len(text) > 30)
            .map(|text| truncate_chars(&text, MAX_SUMMARY_CHARS))
    })
}

fn page_date(root: ElementRef<'_>) -> Option<DateTime<Utc>> {
    if let Some(raw) = meta_content(root, &["published_time"]) {
        if let Some(date) = parse_iso_instant(&raw) {
            return Some(date);
        }
        debug!(raw = %raw, "Unparsable published_time meta");
    }

    let time_attr = ElementMatcher::tag("time")
        .has_attr("datetime")
        .find_all(root)
        .into_iter()
        .find_map(|t| attr_text(&t, "datetime").and_then(|raw| parse_iso_instant(&raw)));
    if time_attr.is_some() {
        return time_attr;
    }

    DATE_CLASSES.iter().find_map(|class| {
        ElementMatcher::any()
            .attr_contains("class", class)
            .find_first(root)
            .and_then(|el| parse_loose_date(&element_text(&el)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StubFetcher;
    use chrono::TimeZone;

    const URL: &str = "https://news.example.com/2024/01/05/river-floods";

    const FULL_PAGE: &str = r#"
        <html><head>
          <title>River floods the old town | Example News</title>
          <meta property="og:title" content="River floods the old town overnight">
          <meta property="og:image" content="/media/flood.jpg?w=1200">
          <meta name="description" content="Residents were evacuated as the river rose two metres.">
          <meta property="article:published_time" content="2024-01-05T06:30:00-05:00">
        </head><body>
          <article><h1>River floods</h1><p>Body text.</p></article>
        </body></html>
    "#;

    #[test]
    fn test_meta_tags_win() {
        let page = parse_deep_page(FULL_PAGE, URL, Some("hint"));
        assert_eq!(page.title.as_deref(), Some("River floods the old town overnight"));
        assert_eq!(
            page.image_url.as_deref(),
            Some("https://news.example.com/media/flood.jpg")
        );
        assert_eq!(
            page.summary.as_deref(),
            Some("Residents were evacuated as the river rose two metres.")
        );
        assert_eq!(
            page.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 11, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_body_fallbacks() {
        let html = r#"
            <html><head><title>Council approves new budget - Politics - Example News</title></head>
            <body>
              <div class="main-content">
                <p>By Jane Doe, published 5 January 2024 at 10:00 in the morning edition</p>
                <p>The council approved the budget after a marathon session that ran past midnight.</p>
                <img src="/static/logo.png">
                <img src="/img/council.jpg" width="800">
              </div>
              <time datetime="2024-01-05T10:00:00">Jan 5</time>
            </body></html>
        "#;
        let page = parse_deep_page(html, URL, None);
        assert_eq!(page.title.as_deref(), Some("Council approves new budget"));
        assert_eq!(
            page.summary.as_deref(),
            Some("The council approved the budget after a marathon session that ran past midnight.")
        );
        assert_eq!(
            page.image_url.as_deref(),
            Some("https://news.example.com/img/council.jpg")
        );
        assert_eq!(
            page.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_title_hint_and_loose_date() {
        let html = r#"
            <html><head><title>Short</title></head>
            <body><h1>Tiny</h1><span class="post-date">05/01/2024 14:30</span></body></html>
        "#;
        let page = parse_deep_page(html, URL, Some("Listing headline"));
        assert_eq!(page.title.as_deref(), Some("Listing headline"));
        assert_eq!(page.summary, None);
        assert_eq!(page.image_url, None);
        assert_eq!(
            page.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 14, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_unparsable_date_is_none() {
        let html = r#"<html><body><span class="fecha">hace 3 horas</span></body></html>"#;
        assert_eq!(parse_deep_page(html, URL, None).publish_date, None);
    }

    #[tokio::test]
    async fn test_network_failure_yields_empty_page() {
        let stub = Arc::new(StubFetcher::new());
        let deep = DeepPageExtractor::new(stub.clone());
        let page = deep.extract(URL, Some("Listing headline")).await;
        assert!(page.is_empty());
        assert_eq!(stub.requests(), vec![format!("GET {URL}")]);
    }

    #[tokio::test]
    async fn test_extract_fetches_once() {
        let stub = Arc::new(StubFetcher::new().with_page(URL, FULL_PAGE));
        let deep = DeepPageExtractor::new(stub.clone());
        let page = deep.extract(URL, None).await;
        assert!(page.title.is_some());
        assert_eq!(stub.request_count(), 1);
    }
}
