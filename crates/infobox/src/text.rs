// ABOUTME: Text normalization helpers shared by the infobox parsers.
// ABOUTME: Whitespace cleanup, footnote stripping, Korean date matching, title URLs and file-safe names.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use url::Url;

static FOOTNOTE_NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[\d+\]\s*").unwrap());
static FOOTNOTE_ANY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[[^\]]+\]\s*").unwrap());
static KOREAN_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}\s*년\s*\d{1,2}\s*월\s*\d{1,2}\s*일").unwrap());
static UNSAFE_FILENAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());
static TRAILING_QUALIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)$").unwrap());

/// Collapses whitespace runs (including non-breaking spaces) into single spaces.
pub fn clean(s: &str) -> String {
    s.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Removes footnote markers such as `[1]` or `[주석]`.
pub fn strip_refs(s: &str) -> String {
    let t = clean(s);
    let t = FOOTNOTE_NUM_RE.replace_all(&t, "");
    let t = FOOTNOTE_ANY_RE.replace_all(&t, "");
    clean(&t)
}

/// Finds the first `YYYY년 M월 D일` date in the text.
pub fn extract_date(s: &str) -> Option<String> {
    KOREAN_DATE_RE.find(s).map(|m| clean(m.as_str()))
}

/// Joins the cleaned, non-empty text nodes of an element with `sep`.
pub fn element_text(el: &ElementRef, sep: &str) -> String {
    el.text()
        .map(clean)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Cleaned, non-empty text nodes of an element, one entry per node.
pub fn element_lines(el: &ElementRef) -> Vec<String> {
    el.text()
        .map(clean)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Builds the page URL for a wiki title. Parentheses stay literal.
pub fn title_url(base: &Url, title: &str) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push("w").push(&clean(title));
    }
    url.to_string()
}

/// Resolves a possibly-relative href against `base`.
pub fn absolute_url(base: &Url, href: &str) -> String {
    if href.trim().is_empty() {
        return String::new();
    }
    base.join(href.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.trim().to_string())
}

/// Turns a display name into a cache file stem.
pub fn safe_filename(name: &str) -> String {
    let name = UNSAFE_FILENAME_RE.replace_all(name.trim(), "_");
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Normalizes a person name for comparison: no whitespace, no trailing `(qualifier)`.
pub fn normalize_person_name(s: &str) -> String {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    TRAILING_QUALIFIER_RE.replace(&compact, "").into_owned()
}
