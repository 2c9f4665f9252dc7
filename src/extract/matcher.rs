//! The one generic "find matching elements" primitive.
//!
//! Source profiles, built-in fallbacks and class-name heuristics are all
//! expressed as an [`ElementMatcher`]: an optional tag name plus a list of
//! attribute tests. There are no per-source branches anywhere in the engine.

use crate::error::{Error, Result};
use crate::models::{AttrValue, SelectorSpec};
use itertools::Itertools;
use regex::Regex;
use scraper::ElementRef;

/// How one attribute is tested.
#[derive(Debug, Clone)]
pub enum ValueTest {
    Present,
    Absent,
    /// Whole-value equality; for `class`, equality with any single class
    /// also counts.
    Exact(String),
    /// Case-insensitive substring of the whole attribute value.
    Contains(String),
    Pattern(Regex),
}

impl ValueTest {
    fn accepts(&self, name: &str, value: Option<&str>) -> bool {
        match (self, value) {
            (ValueTest::Absent, v) => v.is_none(),
            (_, None) => false,
            (ValueTest::Present, Some(_)) => true,
            (ValueTest::Exact(expected), Some(v)) => {
                v == expected
                    || (name == "class" && v.split_whitespace().any(|c| c == expected))
            }
            (ValueTest::Contains(needle), Some(v)) => v.to_lowercase().contains(needle.as_str()),
            (ValueTest::Pattern(re), Some(v)) => re.is_match(v),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementMatcher {
    tag: Option<String>,
    attrs: Vec<(String, ValueTest)>,
}

impl ElementMatcher {
    /// Matches every element.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn tag(name: &str) -> Self {
        Self {
            tag: Some(name.to_ascii_lowercase()),
            attrs: Vec::new(),
        }
    }

    pub fn with(mut self, attr: &str, test: ValueTest) -> Self {
        self.attrs.push((attr.to_ascii_lowercase(), test));
        self
    }

    pub fn has_attr(self, attr: &str) -> Self {
        self.with(attr, ValueTest::Present)
    }

    /// Attribute value contains `needle`, ignoring case.
    pub fn attr_contains(self, attr: &str, needle: &str) -> Self {
        self.with(attr, ValueTest::Contains(needle.to_lowercase()))
    }

    pub fn attr_matches(self, attr: &str, re: &Regex) -> Self {
        self.with(attr, ValueTest::Pattern(re.clone()))
    }

    pub fn matches(&self, el: &ElementRef<'_>) -> bool {
        let value = el.value();
        if let Some(tag) = &self.tag {
            if !value.name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.attrs
            .iter()
            .all(|(name, test)| test.accepts(name, value.attr(name)))
    }

    /// Every matching descendant of `root`, in document order. `root` itself
    /// is never returned.
    pub fn find_all<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        root.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| self.matches(el))
            .collect()
    }

    pub fn find_first<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        root.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|el| self.matches(el))
    }
}

impl TryFrom<&SelectorSpec> for ElementMatcher {
    type Error = Error;

    fn try_from(spec: &SelectorSpec) -> Result<Self> {
        let mut matcher = match spec.tag.as_deref() {
            Some(tag) if !tag.trim().is_empty() => ElementMatcher::tag(tag.trim()),
            _ => ElementMatcher::any(),
        };
        for (name, value) in &spec.attrs {
            let test = match value {
                AttrValue::Present(true) => ValueTest::Present,
                AttrValue::Present(false) => ValueTest::Absent,
                AttrValue::Exact(v) => ValueTest::Exact(v.clone()),
                AttrValue::Pattern { pattern } => ValueTest::Pattern(
                    Regex::new(pattern)
                        .map_err(|e| Error::Selector(format!("{name}: {e}")))?,
                ),
            };
            matcher = matcher.with(name, test);
        }
        Ok(matcher)
    }
}

/// Visible text of an element with whitespace runs collapsed to one space.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).join(" ")
}

/// Trimmed, non-empty attribute value.
pub fn attr_text(el: &ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Length in characters, which is what every length threshold means.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const PAGE: &str = r#"
        <html><body>
          <div class="card featured" data-testid="story-card">
            <h2 class="headline">  First   story </h2>
            <a href="/one" title="Read the first story">link</a>
          </div>
          <div class="card"><h2>Second</h2></div>
          <section itemtype="https://schema.org/NewsArticle"></section>
        </body></html>
    "#;

    #[test]
    fn test_exact_class_matches_single_token() {
        let doc = Html::parse_document(PAGE);
        let spec = SelectorSpec::tag("div").with_attr("class", AttrValue::Exact("card".into()));
        let matcher = ElementMatcher::try_from(&spec).unwrap();
        assert_eq!(matcher.find_all(doc.root_element()).len(), 2);
    }

    #[test]
    fn test_pattern_and_presence_filters() {
        let doc = Html::parse_document(PAGE);
        let spec = SelectorSpec::default()
            .with_attr("data-testid", AttrValue::Pattern { pattern: "(?i)STORY".into() });
        let matcher = ElementMatcher::try_from(&spec).unwrap();
        assert_eq!(matcher.find_all(doc.root_element()).len(), 1);

        let present = ElementMatcher::any().has_attr("itemtype");
        let found = present.find_first(doc.root_element()).unwrap();
        assert_eq!(found.value().name(), "section");
    }

    #[test]
    fn test_invalid_pattern_is_a_selector_error() {
        let spec = SelectorSpec::tag("div").with_attr("class", AttrValue::Pattern { pattern: "(".into() });
        assert!(matches!(ElementMatcher::try_from(&spec), Err(Error::Selector(_))));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let doc = Html::parse_document(PAGE);
        let matcher = ElementMatcher::any().attr_contains("class", "HEADLINE");
        let el = matcher.find_first(doc.root_element()).unwrap();
        assert_eq!(element_text(&el), "First story");
    }

    #[test]
    fn test_find_all_excludes_root() {
        let doc = Html::parse_document(PAGE);
        let card = ElementMatcher::tag("div").find_first(doc.root_element()).unwrap();
        assert_eq!(ElementMatcher::tag("div").find_all(card).len(), 0);
        assert_eq!(attr_text(&ElementMatcher::tag("a").find_first(card).unwrap(), "title").as_deref(), Some("Read the first story"));
    }
}
