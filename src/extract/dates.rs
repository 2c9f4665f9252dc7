//! Timestamp parsing.
//!
//! Every instant leaving this module is a `DateTime<Utc>`. Values carrying an
//! offset are converted; values without one are taken to be UTC. Nothing here
//! returns an error: unparsable input is simply `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Offset-less layouts accepted by [`parse_iso_instant`], tried in order.
const ISO_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset-carrying layouts that RFC 3339 parsing rejects.
const ISO_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

/// The ordered list of layouts tried on free text found in date-ish elements.
/// First match wins.
const LOOSE_FORMATS: &[Layout] = &[
    Layout::DateTime("%Y-%m-%d %H:%M:%S"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%S"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%SZ"),
    Layout::DateTime("%d/%m/%Y %H:%M"),
    Layout::DateTime("%d-%m-%Y %H:%M"),
    Layout::Date("%Y-%m-%d"),
    Layout::Date("%d/%m/%Y"),
];

#[derive(Debug, Clone, Copy)]
enum Layout {
    DateTime(&'static str),
    Date(&'static str),
}

impl Layout {
    fn parse(self, s: &str) -> Option<NaiveDateTime> {
        match self {
            Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(s, fmt).ok(),
            Layout::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
        }
    }
}

/// Parse an ISO-8601 timestamp as found in sitemaps, meta tags and
/// `<time datetime>` attributes.
///
/// Accepts a trailing `Z`, numeric offsets with or without a colon,
/// fractional seconds, naive date-times and bare dates.
pub fn parse_iso_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ISO_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ISO_NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    Layout::Date("%Y-%m-%d").parse(s).map(|naive| naive.and_utc())
}

/// Parse free text through [`LOOSE_FORMATS`].
pub fn parse_loose_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    LOOSE_FORMATS
        .iter()
        .find_map(|layout| layout.parse(s))
        .map(|naive| naive.and_utc())
}
