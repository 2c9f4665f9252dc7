//! Category validation and canonicalization.
//!
//! Category candidates scraped from listing pages are mostly noise: clock
//! times, "LIVE" badges, photo credits, city names. [`normalize`] rejects
//! those and maps the survivors onto a small canonical vocabulary. It is
//! pure and idempotent: `normalize(normalize(x)) == normalize(x)`.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters trimmed from both ends of a candidate.
const EDGE_SEPARATORS: &[char] = &['|', '•', '·', '-', '»', '«', '›', '‹'];

/// Glyph sequences that disqualify a candidate anywhere inside it.
const STRAY_GLYPHS: &[&str] = &["»", "«", "›", "‹", "...", "…", "::"];

/// Substrings marking badges, credits and navigation rather than sections.
const NOISE_WORDS: &[&str] = &[
    "getty",
    "live",
    "breaking",
    "read more",
    "see more",
    "actualidad",
    "último",
    "últimas",
    "hoy",
    "ayer",
    "ahora",
    "destacado",
    "principal",
    "ver más",
    "leer más",
    "continuar",
    "siguiente",
    "desde las",
    "lo último",
    "premios",
    "playoff",
    "basketball",
    "football",
];

/// Place names that show up in dateline/kicker slots.
const PLACE_NAMES: &[&str] = &[
    "lima",
    "méxico",
    "mexico",
    "perú",
    "peru",
    "argentina",
    "colombia",
    "chile",
    "estados unidos",
    "eeuu",
    "usa",
    "la libertad",
    "arequipa",
    "cusco",
    "piura",
    "trujillo",
];

/// Synonym table. Exact (lowercase) match is tried first, then substring
/// containment in table order.
const SYNONYMS: &[(&str, &str)] = &[
    ("tecnologia", "Technology"),
    ("tecnología", "Technology"),
    ("technology", "Technology"),
    ("politica", "Politics"),
    ("política", "Politics"),
    ("gobierno", "Politics"),
    ("government", "Politics"),
    ("economia", "Economy"),
    ("economía", "Economy"),
    ("espectaculos", "Entertainment"),
    ("espectáculos", "Entertainment"),
    ("internacional", "International"),
    ("policiales", "Society"),
    ("ncaa", "Sports"),
    ("college", "Sports"),
    ("soccer", "Sports"),
    ("fútbol", "Sports"),
    ("futbol", "Sports"),
    ("deportes", "Sports"),
];

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 30;

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d{1,2}:\d{2}\s*(h\b|hs\b|hrs\b|[ap]\.?\s?m\b\.?)").expect("static regex")
});
static H_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\d+:\d+\s*h").expect("static regex"));
static DIGITS_AND_COLONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s:]+$").expect("static regex"));
static MERIDIEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b[ap]\.m\.").expect("static regex"));

/// Validate and canonicalize a raw category string. `None` means rejected.
pub fn normalize(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || EDGE_SEPARATORS.contains(&c));
    if trimmed.is_empty() || is_noise(trimmed) {
        return None;
    }

    let cased = if is_all_caps(trimmed) {
        title_case(trimmed)
    } else {
        trimmed.to_string()
    };

    let len = cased.chars().count();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return None;
    }

    Some(canonical(&cased).map(str::to_string).unwrap_or(cased))
}

fn is_noise(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    CLOCK_TIME.is_match(candidate)
        || H_SUFFIX.is_match(candidate)
        || DIGITS_AND_COLONS.is_match(candidate)
        || MERIDIEM.is_match(candidate)
        || NOISE_WORDS.iter().any(|w| lower.contains(w))
        || PLACE_NAMES.contains(&lower.as_str())
        || STRAY_GLYPHS.iter().any(|g| candidate.contains(g))
}

fn canonical(candidate: &str) -> Option<&'static str> {
    let lower = candidate.to_lowercase();
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == lower)
        .or_else(|| SYNONYMS.iter().find(|(key, _)| lower.contains(key)))
        .map(|(_, value)| *value)
}

/// At least one cased character, and every cased character uppercase.
fn is_all_caps(s: &str) -> bool {
    let mut saw_cased = false;
    for c in s.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            saw_cased = true;
        }
    }
    saw_cased
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_times_are_rejected() {
        assert_eq!(normalize("10:16 h"), None);
        assert_eq!(normalize("11:45 p.m."), None);
        assert_eq!(normalize("9:05 AM"), None);
        assert_eq!(normalize("12:30"), None);
        assert_eq!(normalize("2024"), None);
    }

    #[test]
    fn test_noise_words_and_places_are_rejected() {
        assert_eq!(normalize("LIVE"), None);
        assert_eq!(normalize("Breaking News"), None);
        assert_eq!(normalize("Getty Images"), None);
        assert_eq!(normalize("Read more"), None);
        assert_eq!(normalize("Lima"), None);
        assert_eq!(normalize("Estados Unidos"), None);
    }

    #[test]
    fn test_stray_glyphs_and_length_bounds() {
        assert_eq!(normalize("Mundo » Europa"), None);
        assert_eq!(normalize("Más..."), None);
        assert_eq!(normalize("a::b"), None);
        assert_eq!(normalize("TV"), None);
        assert_eq!(normalize(&"x".repeat(31)), None);
        assert_eq!(normalize("   "), None);
    }

    #[test]
    fn test_edge_separators_are_trimmed() {
        assert_eq!(normalize("| Culture •").as_deref(), Some("Culture"));
        assert_eq!(normalize(" - Science - ").as_deref(), Some("Science"));
    }

    #[test]
    fn test_all_caps_becomes_title_case() {
        assert_eq!(normalize("WORLD NEWS").as_deref(), Some("World News"));
        assert_eq!(normalize("Health").as_deref(), Some("Health"));
    }

    #[test]
    fn test_synonyms_exact_then_substring() {
        assert_eq!(normalize("NCAA").as_deref(), Some("Sports"));
        assert_eq!(normalize("college").as_deref(), Some("Sports"));
        assert_eq!(normalize("Soccer").as_deref(), Some("Sports"));
        assert_eq!(normalize("government").as_deref(), Some("Politics"));
        assert_eq!(normalize("Gobierno Regional").as_deref(), Some("Politics"));
        assert_eq!(normalize("POLÍTICA").as_deref(), Some("Politics"));
        assert_eq!(normalize("Tecnología").as_deref(), Some("Technology"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "WORLD NEWS",
            "| Culture •",
            "NCAA",
            "Gobierno Regional",
            "10:16 h",
            "11:45 p.m.",
            "LIVE",
            "  Science   and  Tech ",
            "A B C",
            "Economía",
            "Mundo » Europa",
            "x1Y2",
            "ÉCONOMIE",
            "Sports",
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = once.as_deref().and_then(normalize);
            assert_eq!(twice, once, "not idempotent for {sample:?}");
        }
    }
}
