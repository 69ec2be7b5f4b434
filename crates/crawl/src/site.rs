// ABOUTME: Site profile holding every selector, frame id and URL the crawler uses for one map site.
// ABOUTME: An embedded default targets Naver Map; a JSON file with the same shape replaces it.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::driver::Locator;
use crate::error::ConfigError;
use crate::strategy::Strategy;

const BUILTIN_SITE_JSON: &str = include_str!("../data/naver_map.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub search_url: String,
    pub search_input: Locator,
    /// Frame holding the result list.
    pub list_frame: String,
    /// Frame holding the detail view of the selected item.
    pub detail_frame: String,
    pub list_item: Locator,
    pub scroll_container: Locator,
    pub scroll_offset: i64,
    pub item_name: Locator,
    pub item_category: Locator,
    /// Anchor inside a list item whose href may already carry the canonical id.
    pub item_href: Locator,
    /// Tried in order to open an item's detail view.
    pub place_links: Vec<Strategy>,
    /// Substring every detail URL contains, whether or not it carries an id.
    #[serde(default = "default_detail_marker")]
    pub detail_url_marker: String,
    /// URL pattern of a detail view; group 1 is the canonical id.
    pub detail_url_pattern: String,
    pub visitor_reviews: Locator,
    pub blog_reviews: Locator,
    pub address: Locator,
    /// Address lines starting with this prefix are preferred, prefix removed.
    pub address_prefix: String,
    pub info_tab: Locator,
    /// Controls that page the tab strip when the info tab is hidden.
    #[serde(default)]
    pub tab_next: Vec<Strategy>,
    pub more_button: Locator,
    pub intro: Vec<Strategy>,
    pub keywords: Locator,
    pub review_tab: Locator,
    pub review_items: Locator,
    pub review_keyword: Locator,
    pub review_limit: usize,
    pub next_page: Locator,
}

fn default_detail_marker() -> String {
    "place/".to_string()
}

impl SiteProfile {
    /// The embedded Naver Map profile.
    ///
    /// # Panics
    ///
    /// Panics if the embedded JSON is malformed.
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_SITE_JSON).expect("failed to parse builtin site profile")
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn detail_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.detail_url_pattern).map_err(|e| ConfigError::Pattern {
            pattern: self.detail_url_pattern.clone(),
            message: e.to_string(),
        })
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::builtin()
    }
}
