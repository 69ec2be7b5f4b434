// ABOUTME: Place record schema produced by the detail extractor, plus id and review-count helpers.
// ABOUTME: Missing optional fields stay None and serialize as null instead of placeholder strings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*").unwrap());

pub const SYNTHETIC_PREFIX: &str = "synthetic-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCounts {
    pub visitor: Option<u32>,
    pub blog: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub canonical_id: String,
    pub target_query: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub review_counts: ReviewCounts,
    pub intro_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Short quotes from the first visitor reviews.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_highlights: Vec<String>,
}

impl PlaceRecord {
    pub fn is_synthetic(&self) -> bool {
        self.canonical_id.starts_with(SYNTHETIC_PREFIX)
    }
}

/// First digit group of `text`, thousands separators removed.
pub fn parse_review_count(text: &str) -> Option<u32> {
    DIGITS_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// Canonical id from a detail URL, i.e. capture group 1 of `pattern`.
pub fn canonical_id_from_url(pattern: &Regex, url: &str) -> Option<String> {
    pattern
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Deterministic stand-in id for an item whose canonical id could not be read.
pub fn synthetic_id(target: &str, name: Option<&str>, category: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for part in [target, name.unwrap_or(""), category.unwrap_or("")] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("{SYNTHETIC_PREFIX}{}", &digest[..12])
}
