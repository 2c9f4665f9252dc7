//! Image candidate handling shared by listing and deep extraction.
//!
//! A candidate `<img>` goes through three steps: pick a source attribute
//! (lazy-loading sites rarely use `src`), check it is a real picture rather
//! than an icon or tracking pixel, then make it absolute.

use crate::extract::matcher::attr_text;
use scraper::ElementRef;
use url::Url;

/// Attributes that may carry the image URL, in priority order.
const SOURCE_ATTRS: &[&str] = &[
    "src",
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-url",
    "data-image",
    "data-lazy",
    "data-srcset",
];

/// Path fragments that identify UI chrome rather than content.
const CHROME_PATHS: &[&str] = &["/favicon.", "/favicon/", "/sprite.", "/sprite/"];

/// Substrings that disqualify an article-page image.
const DECORATION_MARKERS: &[&str] = &["icon", "logo", "avatar", "favicon"];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];

/// Declared dimensions below this are badges or spacers.
const MIN_DIMENSION_PX: u32 = 50;

/// Raw source of an `<img>`, taken from the first populated attribute.
pub fn image_source(el: &ElementRef<'_>) -> Option<String> {
    SOURCE_ATTRS.iter().find_map(|attr| {
        let value = attr_text(el, attr)?;
        if *attr == "data-srcset" {
            value
                .split(',')
                .next()
                .and_then(|candidate| candidate.split_whitespace().next())
                .map(str::to_string)
        } else {
            Some(value)
        }
    })
}

/// Rejects `data:` URIs and icon/sprite paths.
pub fn is_valid_image_url(src: &str) -> bool {
    let src = src.trim();
    if src.is_empty() || src.to_ascii_lowercase().starts_with("data:") {
        return false;
    }
    let lower = src.to_lowercase();
    !CHROME_PATHS.iter().any(|p| lower.contains(p))
}

/// Declared `width`/`height`, when present and numeric, must both be at
/// least [`MIN_DIMENSION_PX`]. Undeclared dimensions pass.
pub fn has_acceptable_dimensions(el: &ElementRef<'_>) -> bool {
    ["width", "height"].iter().all(|attr| {
        match attr_text(el, attr).and_then(|v| parse_pixels(&v)) {
            Some(px) => px >= MIN_DIMENSION_PX,
            None => true,
        }
    })
}

fn parse_pixels(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_suffix("px")
        .or_else(|| trimmed.strip_suffix("PX"))
        .unwrap_or(trimmed)
        .trim();
    digits
        .parse::<u32>()
        .ok()
        .or_else(|| digits.parse::<f64>().ok().map(|f| f.max(0.0) as u32))
}

/// Resolve `src` against `base` and drop the query string when the bare path
/// already ends in a known image extension.
pub fn absolutize_image(base: &str, src: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let mut url = base.join(src.trim()).ok()?;
    let path = url.path().to_ascii_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        url.set_query(None);
    }
    Some(url.to_string())
}

/// Full pipeline for one `<img>`: source, validity, dimensions, absolute URL.
pub fn resolve_img(el: &ElementRef<'_>, base: &str) -> Option<String> {
    if !has_acceptable_dimensions(el) {
        return None;
    }
    let src = image_source(el)?;
    if !is_valid_image_url(&src) {
        return None;
    }
    absolutize_image(base, &src)
}

/// Logos, avatars and icons that article pages sprinkle around the body.
pub fn looks_decorative(url: &str) -> bool {
    let lower = url.to_lowercase();
    DECORATION_MARKERS.iter().any(|m| lower.contains(m))
}
