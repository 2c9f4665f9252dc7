//! Listing page extraction.
//!
//! Turns a page of article teasers into [`Article`]s. Each field is resolved
//! by an ordered chain of small functions over one teaser block; the first
//! one that yields a usable value wins. The profile's own matchers always go
//! first, followed by generic heuristics, so a site whose markup drifted away
//! from its profile still produces something.
//!
//! # Escalation
//!
//! When a teaser is thin (placeholder or very short title, no image, or
//! placeholder or very short summary) and links to a real article page, that
//! page is fetched through [`DeepPageExtractor`] and used to fill only the
//! fields that are still missing. Teasers that are already complete cost no
//! extra requests.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::extract::category::normalize as normalize_category;
use crate::extract::images::{absolutize_image, is_valid_image_url, resolve_img};
use crate::extract::matcher::{ElementMatcher, attr_text, char_len, element_text};
use crate::fetch::{PageFetcher, RetryPolicy, fetch_with_backoff};
use crate::models::{
    Article, MAX_SUMMARY_CHARS, NO_SUMMARY, SelectorSet, SourceProfile, UNTITLED,
};
use crate::scrapers::deep::DeepPageExtractor;
use crate::utils::{looks_like_byline, truncate_chars, upcase};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

const TITLE_CLASSES: &[&str] = &[
    "title",
    "headline",
    "titulo",
    "noticia-titulo",
    "entry-title",
    "post-title",
    "article-title",
    "story-title",
    "news-title",
];

const SUMMARY_CLASSES: &[&str] = &["summary", "excerpt", "resumen", "description", "descripcion", "lead"];

const TEASER_CLASSES: &[&str] = &["lead", "intro", "summary", "excerpt", "abstract", "preview"];

const SUMMARY_ATTRS: &[&str] = &["data-description", "aria-label", "title"];

const IMAGE_CLASSES: &[&str] = &[
    "image",
    "img",
    "photo",
    "picture",
    "foto",
    "imagen",
    "thumbnail",
    "thumb",
];

const CATEGORY_CLASSES: &[&str] = &[
    "category",
    "categoria",
    "section",
    "seccion",
    "topic",
    "tema",
    "tag",
    "label",
    "etiqueta",
    "badge",
    "pill",
    "kicker",
];

const CATEGORY_ATTRS: &[&str] = &["data-category", "data-section", "data-topic", "data-tag"];

const CATEGORY_LINK_CLASSES: &[&str] = &["category", "section", "topic", "tag"];

const RELATIVE_TIME_WORDS: &[&str] = &["ago", "min", "hour", "day", "hace", "hora"];

/// URL path segments that name a section outright.
const KNOWN_SECTIONS: &[&str] = &[
    "deportes",
    "sports",
    "tecnologia",
    "technology",
    "tech",
    "politica",
    "politics",
    "economia",
    "economy",
    "business",
    "salud",
    "health",
    "ciencia",
    "science",
    "cultura",
    "culture",
    "entretenimiento",
    "entertainment",
    "mundo",
    "world",
    "internacional",
    "nacional",
    "local",
    "educacion",
    "education",
    "finanzas",
    "finance",
];

static BLOCK_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)article|story|news|noticia|post").expect("static regex"));
static NEWS_ITEMTYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)schema\.org/NewsArticle").expect("static regex"));
static STORY_TESTID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)article|story").expect("static regex"));
static BACKGROUND_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)background-image\s*:\s*url\(\s*["']?([^"')]+)["']?\s*\)"#).expect("static regex")
});

/// Tried in order when the profile's container matcher finds nothing.
static FALLBACK_BLOCKS: Lazy<Vec<ElementMatcher>> = Lazy::new(|| {
    vec![
        ElementMatcher::tag("article"),
        ElementMatcher::tag("div").attr_matches("class", &BLOCK_CLASS),
        ElementMatcher::tag("div").attr_matches("itemtype", &NEWS_ITEMTYPE),
        ElementMatcher::any().attr_matches("data-testid", &STORY_TESTID),
    ]
});

/// A profile's six selector specs, compiled once per extraction.
#[derive(Debug, Clone)]
pub struct ProfileMatchers {
    container: ElementMatcher,
    title: ElementMatcher,
    summary: ElementMatcher,
    link: Option<ElementMatcher>,
    image: Option<ElementMatcher>,
    category: Option<ElementMatcher>,
}

impl ProfileMatchers {
    pub fn compile(set: &SelectorSet) -> Result<Self> {
        Ok(Self {
            container: ElementMatcher::try_from(&set.container)?,
            title: ElementMatcher::try_from(&set.title)?,
            summary: ElementMatcher::try_from(&set.summary)?,
            link: set.link.as_ref().map(ElementMatcher::try_from).transpose()?,
            image: set.image.as_ref().map(ElementMatcher::try_from).transpose()?,
            category: set.category.as_ref().map(ElementMatcher::try_from).transpose()?,
        })
    }
}

/// What every field strategy gets to look at.
struct Block<'a, 'm> {
    el: ElementRef<'a>,
    matchers: &'m ProfileMatchers,
    base: &'m Url,
    /// The resolved article URL.
    url: String,
}

type Strategy = fn(&Block<'_, '_>) -> Option<String>;

const TITLE_CHAIN: &[Strategy] = &[
    title_from_profile,
    title_from_headings,
    title_from_link,
    title_from_classes,
    title_from_title_attr,
    title_from_text_scan,
];

const SUMMARY_CHAIN: &[Strategy] = &[
    summary_from_profile,
    summary_from_classes,
    summary_from_paragraph,
    summary_from_teaser_classes,
    summary_from_attrs,
];

const IMAGE_CHAIN: &[Strategy] = &[
    image_from_profile,
    image_from_classes,
    image_in_first_link,
    image_from_first_imgs,
    image_from_background,
];

const CATEGORY_CHAIN: &[Strategy] = &[
    category_from_profile,
    category_from_classes,
    category_from_link_class,
    category_from_span,
    category_from_url_path,
];

fn first_of(chain: &[Strategy], block: &Block<'_, '_>) -> Option<String> {
    chain.iter().find_map(|strategy| strategy(block))
}

/// Text of the first element `matcher` finds, if it passes `accept`.
fn first_text(
    root: ElementRef<'_>,
    matcher: &ElementMatcher,
    accept: impl Fn(usize) -> bool,
) -> Option<String> {
    let el = matcher.find_first(root)?;
    let text = element_text(&el);
    accept(char_len(&text)).then_some(text)
}

fn has_contact_noise(text: &str) -> bool {
    text.contains("http") || text.contains('@') || text.contains(".com")
}

fn title_from_profile(b: &Block<'_, '_>) -> Option<String> {
    first_text(b.el, &b.matchers.title, |n| n >= 5)
}

fn title_from_headings(b: &Block<'_, '_>) -> Option<String> {
    ["h1", "h2", "h3", "h4"]
        .iter()
        .find_map(|h| first_text(b.el, &ElementMatcher::tag(h), |n| n > 5))
}

fn title_from_link(b: &Block<'_, '_>) -> Option<String> {
    let link = ElementMatcher::tag("a").find_first(b.el)?;
    attr_text(&link, "title")
        .filter(|t| char_len(t) >= 5)
        .or_else(|| {
            let text = element_text(&link);
            (char_len(&text) > 5).then_some(text)
        })
}

fn title_from_classes(b: &Block<'_, '_>) -> Option<String> {
    TITLE_CLASSES.iter().find_map(|class| {
        first_text(b.el, &ElementMatcher::any().attr_contains("class", class), |n| n > 5)
    })
}

fn title_from_title_attr(b: &Block<'_, '_>) -> Option<String> {
    ElementMatcher::any()
        .has_attr("title")
        .find_all(b.el)
        .iter()
        .filter_map(|el| attr_text(el, "title"))
        .find(|t| char_len(t) > 10)
}

fn title_from_text_scan(b: &Block<'_, '_>) -> Option<String> {
    ["div", "span", "p"].iter().find_map(|tag| {
        ElementMatcher::tag(tag)
            .find_all(b.el)
            .iter()
            .take(10)
            .map(element_text)
            .find(|text| {
                let n = char_len(text);
                n > 20 && n < 200 && !has_contact_noise(text)
            })
    })
}

fn summary_from_profile(b: &Block<'_, '_>) -> Option<String> {
    first_text(b.el, &b.matchers.summary, |n| n >= 10)
}

fn summary_from_classes(b: &Block<'_, '_>) -> Option<String> {
    SUMMARY_CLASSES.iter().find_map(|class| {
        first_text(b.el, &ElementMatcher::any().attr_contains("class", class), |n| n > 10)
    })
}

fn summary_from_paragraph(b: &Block<'_, '_>) -> Option<String> {
    ElementMatcher::tag("p")
        .find_all(b.el)
        .iter()
        .map(element_text)
        .find(|text| {
            let n = char_len(text);
            n > 20 && n < 1000 && !looks_like_byline(text)
        })
}

fn summary_from_teaser_classes(b: &Block<'_, '_>) -> Option<String> {
    TEASER_CLASSES.iter().find_map(|class| {
        first_text(b.el, &ElementMatcher::any().attr_contains("class", class), |n| n > 20)
    })
}

fn summary_from_attrs(b: &Block<'_, '_>) -> Option<String> {
    let candidates = std::iter::once(b.el).chain(b.el.descendants().skip(1).filter_map(ElementRef::wrap));
    for el in candidates {
        for attr in SUMMARY_ATTRS {
            if let Some(value) = attr_text(&el, attr) {
                let n = char_len(&value);
                if n > 20 && n < 500 {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// The element itself when it is an `<img>`, else the first `<img>` inside.
fn as_img<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    if el.value().name().eq_ignore_ascii_case("img") {
        Some(el)
    } else {
        ElementMatcher::tag("img").find_first(el)
    }
}

fn image_from_profile(b: &Block<'_, '_>) -> Option<String> {
    let matcher = b.matchers.image.as_ref()?;
    let el = matcher.find_first(b.el)?;
    resolve_img(&as_img(el)?, b.base.as_str())
}

fn image_from_classes(b: &Block<'_, '_>) -> Option<String> {
    IMAGE_CLASSES.iter().find_map(|class| {
        ElementMatcher::tag("img")
            .attr_contains("class", class)
            .find_all(b.el)
            .iter()
            .find_map(|img| resolve_img(img, b.base.as_str()))
    })
}

fn image_in_first_link(b: &Block<'_, '_>) -> Option<String> {
    let link = ElementMatcher::tag("a").has_attr("href").find_first(b.el)?;
    let img = ElementMatcher::tag("img").find_first(link)?;
    resolve_img(&img, b.base.as_str())
}

fn image_from_first_imgs(b: &Block<'_, '_>) -> Option<String> {
    ElementMatcher::tag("img")
        .find_all(b.el)
        .iter()
        .take(5)
        .find_map(|img| resolve_img(img, b.base.as_str()))
}

fn image_from_background(b: &Block<'_, '_>) -> Option<String> {
    let candidates = std::iter::once(b.el).chain(b.el.descendants().skip(1).filter_map(ElementRef::wrap));
    candidates
        .filter_map(|el| attr_text(&el, "style"))
        .filter_map(|style| {
            BACKGROUND_URL
                .captures(&style)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|src| is_valid_image_url(src))
        .find_map(|src| absolutize_image(b.base.as_str(), &src))
}

fn category_from_profile(b: &Block<'_, '_>) -> Option<String> {
    let matcher = b.matchers.category.as_ref()?;
    first_text(b.el, matcher, |n| n > 0)
}

fn category_from_classes(b: &Block<'_, '_>) -> Option<String> {
    let by_class = CATEGORY_CLASSES.iter().find_map(|class| {
        ElementMatcher::any()
            .attr_contains("class", class)
            .find_all(b.el)
            .iter()
            .map(element_text)
            .find(|text| {
                let n = char_len(text);
                n > 2 && n < 50 && !has_contact_noise(text)
            })
    });
    by_class.or_else(|| {
        let candidates =
            std::iter::once(b.el).chain(b.el.descendants().skip(1).filter_map(ElementRef::wrap));
        candidates
            .flat_map(|el| CATEGORY_ATTRS.iter().filter_map(move |attr| attr_text(&el, attr)))
            .next()
    })
}

fn category_from_link_class(b: &Block<'_, '_>) -> Option<String> {
    CATEGORY_LINK_CLASSES.iter().find_map(|class| {
        first_text(
            b.el,
            &ElementMatcher::tag("a").attr_contains("class", class),
            |n| n > 0,
        )
    })
}

fn category_from_span(b: &Block<'_, '_>) -> Option<String> {
    ElementMatcher::tag("span")
        .find_all(b.el)
        .iter()
        .take(10)
        .map(element_text)
        .find(|text| looks_like_section_label(text))
}

fn looks_like_section_label(text: &str) -> bool {
    let n = char_len(text);
    if !(3..=30).contains(&n) {
        return false;
    }
    if text.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    let lower = text.to_lowercase();
    if RELATIVE_TIME_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    text.split_whitespace()
        .all(|word| word.chars().next().is_some_and(char::is_uppercase))
}

fn category_from_url_path(b: &Block<'_, '_>) -> Option<String> {
    let url = Url::parse(&b.url).ok()?;
    let segments = url.path_segments()?;
    segments
        .take(3)
        .map(str::to_lowercase)
        .find(|seg| KNOWN_SECTIONS.contains(&seg.as_str()))
        .map(|seg| upcase(&seg))
}

/// Article URL: profile link, then any `<a href>`, then the source's own
/// base URL when the block has no link at all.
fn resolve_link(el: ElementRef<'_>, matchers: &ProfileMatchers, profile: &SourceProfile, base: &Url) -> Result<String> {
    let from_profile = matchers.link.as_ref().and_then(|m| {
        m.find_all(el)
            .iter()
            .find_map(|a| attr_text(a, "href"))
    });
    let href = from_profile.or_else(|| {
        ElementMatcher::tag("a")
            .has_attr("href")
            .find_all(el)
            .iter()
            .find_map(|a| attr_text(a, "href"))
    });
    match href {
        Some(href) => Ok(base.join(&href)?.to_string()),
        None => Ok(profile.base_url.clone()),
    }
}

/// Teaser blocks: profile container first, then the built-in fallbacks.
/// The first strategy with any match wins.
fn discover_blocks<'a>(root: ElementRef<'a>, container: &ElementMatcher) -> Vec<ElementRef<'a>> {
    let found = container.find_all(root);
    if !found.is_empty() {
        return found;
    }
    for (i, fallback) in FALLBACK_BLOCKS.iter().enumerate() {
        let found = fallback.find_all(root);
        if !found.is_empty() {
            debug!(strategy = i + 1, blocks = found.len(), "Container selector missed; using fallback blocks");
            return found;
        }
    }
    Vec::new()
}

fn extract_block(
    el: ElementRef<'_>,
    matchers: &ProfileMatchers,
    profile: &SourceProfile,
    base: &Url,
) -> Result<Article> {
    let url = resolve_link(el, matchers, profile, base)?;
    let block = Block {
        el,
        matchers,
        base,
        url,
    };

    let title = first_of(TITLE_CHAIN, &block).unwrap_or_else(|| UNTITLED.to_string());
    let summary = first_of(SUMMARY_CHAIN, &block)
        .map(|s| truncate_chars(&s, MAX_SUMMARY_CHARS))
        .unwrap_or_else(|| NO_SUMMARY.to_string());
    let image_url = first_of(IMAGE_CHAIN, &block);
    let category = first_of(CATEGORY_CHAIN, &block).and_then(|raw| {
        let normalized = normalize_category(&raw);
        if normalized.is_none() {
            debug!(raw = %raw, "Category candidate rejected");
        }
        normalized
    });

    Ok(Article {
        title,
        url: block.url,
        summary,
        image_url,
        category,
        publish_date: None,
        source_id: profile.id,
        source_name: profile.name.clone(),
    })
}

/// Synchronous half of extraction: parse, find blocks, run the chains.
fn extract_listing(
    html: &str,
    profile: &SourceProfile,
    matchers: &ProfileMatchers,
    base: &Url,
    limit: usize,
) -> Vec<Article> {
    let doc = Html::parse_document(html);
    let blocks = discover_blocks(doc.root_element(), &matchers.container);
    debug!(blocks = blocks.len(), limit, "Discovered teaser blocks");

    let mut articles = Vec::new();
    for (i, el) in blocks.into_iter().take(limit).enumerate() {
        match extract_block(el, matchers, profile, base) {
            Ok(article) => articles.push(article),
            Err(e) => warn!(block = i, error = %e, "Skipping teaser block"),
        }
    }
    articles
}

fn title_is_weak(title: &str) -> bool {
    title == UNTITLED || char_len(title) < 5
}

fn summary_is_weak(summary: &str) -> bool {
    summary == NO_SUMMARY || char_len(summary) < 20
}

/// Thin teaser with a real article page behind it.
fn needs_escalation(article: &Article, profile: &SourceProfile, base: &Url) -> bool {
    let thin = title_is_weak(&article.title)
        || article.image_url.is_none()
        || summary_is_weak(&article.summary);
    let lower = article.url.to_ascii_lowercase();
    let fetchable = (lower.starts_with("http://") || lower.starts_with("https://"))
        && article.url != profile.base_url
        && article.url != base.as_str();
    thin && fetchable
}

pub struct ListingExtractor {
    fetcher: Arc<dyn PageFetcher>,
    deep: DeepPageExtractor,
    politeness_delay: Duration,
    retry: RetryPolicy,
}

impl ListingExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &EngineConfig) -> Self {
        Self {
            deep: DeepPageExtractor::new(fetcher.clone()),
            fetcher,
            politeness_delay: config.politeness_delay(),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Fetch the profile's listing page and extract up to `limit` articles.
    /// Failing to fetch the listing page is the one error this returns.
    #[instrument(level = "info", skip_all, fields(source = %profile.name, url = %profile.base_url))]
    pub async fn scrape_source(&self, profile: &SourceProfile, limit: usize) -> Result<Vec<Article>> {
        let html = fetch_with_backoff(self.fetcher.as_ref(), &profile.base_url, self.retry).await?;
        self.extract(&html, profile, limit).await
    }

    /// Extract up to `limit` articles from listing `html`, in page order.
    ///
    /// Errors only when the profile itself is unusable (bad base URL or a
    /// matcher pattern that does not compile).
    pub async fn extract(&self, html: &str, profile: &SourceProfile, limit: usize) -> Result<Vec<Article>> {
        let matchers = ProfileMatchers::compile(&profile.selectors)?;
        let base = Url::parse(&profile.base_url)?;
        let listed = extract_listing(html, profile, &matchers, &base, limit);

        let mut escalated = 0usize;
        let mut articles = Vec::with_capacity(listed.len());
        for mut article in listed {
            if needs_escalation(&article, profile, &base) {
                self.escalate(&mut article).await;
                escalated += 1;
            }
            articles.push(article);
        }

        info!(
            source = %profile.name,
            articles = articles.len(),
            escalated,
            "Extracted listing"
        );
        Ok(articles)
    }

    /// Fill the article's missing fields from its own page. Fields already
    /// set at listing level are never overwritten.
    async fn escalate(&self, article: &mut Article) {
        let hint = (!article.has_placeholder_title()).then(|| article.title.clone());
        let page = self.deep.extract(&article.url, hint.as_deref()).await;

        if title_is_weak(&article.title) {
            if let Some(title) = page.title {
                article.title = title;
            }
        }
        if article.image_url.is_none() {
            article.image_url = page.image_url;
        }
        if summary_is_weak(&article.summary) {
            if let Some(summary) = page.summary {
                article.summary = truncate_chars(&summary, MAX_SUMMARY_CHARS);
            }
        }
        if article.publish_date.is_none() {
            article.publish_date = page.publish_date;
        }

        sleep(self.politeness_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StubFetcher;
    use crate::models::{AttrValue, SelectorSpec};

    const BASE: &str = "https://news.example.com/";

    fn profile(container: SelectorSpec) -> SourceProfile {
        SourceProfile {
            id: 9,
            name: "Example".to_string(),
            base_url: BASE.to_string(),
            active: true,
            selectors: SelectorSet {
                container,
                title: SelectorSpec::tag("h3").with_attr("class", AttrValue::Exact("card-title".into())),
                summary: SelectorSpec::tag("p").with_attr("class", AttrValue::Exact("card-dek".into())),
                link: Some(SelectorSpec::tag("a")),
                image: Some(SelectorSpec::tag("img")),
                category: Some(SelectorSpec::tag("span").with_attr("class", AttrValue::Exact("kicker".into()))),
            },
            owner_id: 2,
        }
    }

    fn card_profile() -> SourceProfile {
        profile(SelectorSpec::tag("div").with_attr("class", AttrValue::Exact("card".into())))
    }

    fn extractor(stub: &Arc<StubFetcher>) -> ListingExtractor {
        ListingExtractor::new(stub.clone(), &EngineConfig::without_delays())
    }

    const FULL_CARDS: &str = r#"
        <html><body>
          <div class="card">
            <span class="kicker">ECONOMÍA</span>
            <a href="/2024/01/05/rates"><img src="/img/rates.jpg?w=640" width="640"></a>
            <h3 class="card-title">Central bank holds rates steady</h3>
            <p class="card-dek">Policymakers kept the benchmark unchanged for a third meeting.</p>
          </div>
          <div class="card">
            <span class="kicker">10:16 h</span>
            <a href="https://other.example.net/world/story"><img data-src="https://cdn.example.net/s.png"></a>
            <h3 class="card-title">Storm batters the northern coast</h3>
            <p class="card-dek">Thousands without power after gusts topped 120 km/h overnight.</p>
          </div>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_complete_teasers_need_no_extra_fetches() {
        let stub = Arc::new(StubFetcher::new());
        let articles = extractor(&stub)
            .extract(FULL_CARDS, &card_profile(), 10)
            .await
            .unwrap();

        assert_eq!(stub.request_count(), 0);
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.title, "Central bank holds rates steady");
        assert_eq!(first.url, "https://news.example.com/2024/01/05/rates");
        assert_eq!(first.image_url.as_deref(), Some("https://news.example.com/img/rates.jpg"));
        assert_eq!(first.category.as_deref(), Some("Economy"));
        assert_eq!(first.source_id, 9);

        let second = &articles[1];
        assert_eq!(second.url, "https://other.example.net/world/story");
        assert_eq!(second.image_url.as_deref(), Some("https://cdn.example.net/s.png"));
        assert_eq!(second.category, None);
    }

    #[tokio::test]
    async fn test_limit_caps_blocks() {
        let stub = Arc::new(StubFetcher::new());
        let articles = extractor(&stub)
            .extract(FULL_CARDS, &card_profile(), 1)
            .await
            .unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Central bank holds rates steady");
    }

    #[tokio::test]
    async fn test_missing_title_is_filled_from_og_title() {
        let listing = r#"
            <html><body>
              <div class="card"><a href="/2024/01/05/flood"><img src="/img/flood.jpg"></a></div>
            </body></html>
        "#;
        let article_page = r#"
            <html><head>
              <meta property="og:title" content="River floods the old town overnight">
              <meta name="description" content="Residents were evacuated as the river rose two metres.">
              <meta property="og:image" content="/img/other.jpg">
              <meta property="article:published_time" content="2024-01-05T06:30:00Z">
            </head><body></body></html>
        "#;
        let url = "https://news.example.com/2024/01/05/flood";
        let stub = Arc::new(StubFetcher::new().with_page(url, article_page));

        let articles = extractor(&stub)
            .extract(listing, &card_profile(), 5)
            .await
            .unwrap();

        assert_eq!(stub.requests(), vec![format!("GET {url}")]);
        let article = &articles[0];
        assert!(!article.has_placeholder_title());
        assert_eq!(article.title, "River floods the old town overnight");
        assert_eq!(article.summary, "Residents were evacuated as the river rose two metres.");
        // Listing-level image is kept.
        assert_eq!(article.image_url.as_deref(), Some("https://news.example.com/img/flood.jpg"));
        assert!(article.publish_date.is_some());
    }

    #[tokio::test]
    async fn test_failed_escalation_keeps_partial_data() {
        let listing = r#"
            <html><body>
              <div class="card">
                <h3 class="card-title">Council approves budget</h3>
                <a href="/politica/budget">more</a>
              </div>
            </body></html>
        "#;
        let stub = Arc::new(StubFetcher::new());
        let articles = extractor(&stub)
            .extract(listing, &card_profile(), 5)
            .await
            .unwrap();

        assert_eq!(stub.request_count(), 1);
        let article = &articles[0];
        assert_eq!(article.title, "Council approves budget");
        assert_eq!(article.summary, NO_SUMMARY);
        assert_eq!(article.image_url, None);
        assert_eq!(article.category.as_deref(), Some("Politics"));
    }

    #[tokio::test]
    async fn test_block_without_link_points_at_base_and_skips_escalation() {
        let listing = r#"
            <html><body>
              <div class="card"><h3 class="card-title">Market update for traders</h3></div>
            </body></html>
        "#;
        let stub = Arc::new(StubFetcher::new());
        let articles = extractor(&stub)
            .extract(listing, &card_profile(), 5)
            .await
            .unwrap();
        assert_eq!(articles[0].url, BASE);
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_blocks_and_heuristics() {
        let listing = r#"
            <html><body>
              <article>
                <h2>Scientists map the deep ocean floor</h2>
                <p>By Ana Ruiz | Published 5 January 2024</p>
                <p>A new survey charts thousands of previously unknown seamounts.</p>
                <div class="thumb" style="background-image: url('/img/ocean.webp?v=3')"></div>
                <span class="tag">Ciencia</span>
                <a href="/ciencia/ocean-floor">Read</a>
              </article>
              <article>
                <a href="/mundo/summit" title="Leaders meet for climate summit"><img src="/favicon.ico"></a>
                <div class="excerpt">Delegates from 40 countries gathered in Lima.</div>
              </article>
            </body></html>
        "#;
        let summit_page = r#"<html><head><meta property="og:image" content="/img/summit.jpg"></head></html>"#;
        let stub = Arc::new(
            StubFetcher::new().with_page("https://news.example.com/mundo/summit", summit_page),
        );
        let no_container = profile(SelectorSpec::tag("li").with_attr("class", AttrValue::Exact("missing".into())));

        let articles = extractor(&stub).extract(listing, &no_container, 5).await.unwrap();
        assert_eq!(articles.len(), 2);

        let ocean = &articles[0];
        assert_eq!(ocean.title, "Scientists map the deep ocean floor");
        assert_eq!(ocean.summary, "A new survey charts thousands of previously unknown seamounts.");
        assert_eq!(ocean.image_url.as_deref(), Some("https://news.example.com/img/ocean.webp"));
        assert_eq!(ocean.category.as_deref(), Some("Ciencia"));

        let summit = &articles[1];
        assert_eq!(summit.title, "Leaders meet for climate summit");
        assert_eq!(summit.summary, "Delegates from 40 countries gathered in Lima.");
        assert_eq!(summit.image_url.as_deref(), Some("https://news.example.com/img/summit.jpg"));
        assert_eq!(summit.category.as_deref(), Some("Mundo"));
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_block_is_skipped() {
        let listing = r#"
            <html><body>
              <div class="card"><h3 class="card-title">Broken link here</h3><a href="http://[oops/x">x</a></div>
              <div class="card">
                <h3 class="card-title">Working story title</h3>
                <a href="/ok"><img src="/ok.jpg"></a>
                <p class="card-dek">A perfectly ordinary summary of the story.</p>
              </div>
            </body></html>
        "#;
        let stub = Arc::new(StubFetcher::new());
        let articles = extractor(&stub).extract(listing, &card_profile(), 5).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Working story title");
    }

    #[tokio::test]
    async fn test_invalid_profile_pattern_is_an_error() {
        let bad = profile(SelectorSpec::tag("div").with_attr("class", AttrValue::Pattern { pattern: "[".into() }));
        let stub = Arc::new(StubFetcher::new());
        assert!(extractor(&stub).extract("<html></html>", &bad, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_scrape_source_fetches_listing() {
        let stub = Arc::new(StubFetcher::new().with_page(BASE, FULL_CARDS));
        let articles = extractor(&stub).scrape_source(&card_profile(), 5).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(stub.requests(), vec![format!("GET {BASE}")]);

        let down = Arc::new(StubFetcher::new());
        assert!(extractor(&down).scrape_source(&card_profile(), 5).await.is_err());
    }

    #[test]
    fn test_section_label_heuristic() {
        assert!(looks_like_section_label("World News"));
        assert!(!looks_like_section_label("5 things to know"));
        assert!(!looks_like_section_label("Hace 3 Horas"));
        assert!(!looks_like_section_label("lowercase label"));
        assert!(!looks_like_section_label("AB"));
    }
}
