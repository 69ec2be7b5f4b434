// ABOUTME: Serde configuration for block scoring weights, markup hints and relation vocabulary.
// ABOUTME: Ships an embedded default tuned for namu.wiki; any field can be overridden from a JSON file.

//! Infobox configuration.
//!
//! The scoring weights and label vocabulary were tuned against a single
//! site's markup, so they live in data rather than code. The embedded
//! default is loaded with [`InfoboxConfig::builtin`]; [`InfoboxConfig::from_file`]
//! reads a replacement with the same shape.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const BUILTIN_CONFIG_JSON: &str = include_str!("../data/namu.json");

/// Weights and selectors used by the content block locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    pub block_selector: String,
    pub header_selector: String,
    pub image_selector: String,
    pub labels: Vec<String>,
    pub header_weight: i32,
    pub image_weight: i32,
    pub label_weight: i32,
    /// Blocks whose text is longer than this many characters are penalized.
    pub length_ceiling: usize,
    pub length_penalty: i32,
    pub min_score: i32,
}

/// Site-specific markup hints for field parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Optional wrapper inside a value cell holding the actual content.
    pub value_wrapper_selector: String,
    /// An anchor with any of these classes links to a person page.
    pub person_link_classes: Vec<String>,
    pub date_link_selector: String,
    /// Image hosts that earn a small ranking bonus.
    #[serde(default)]
    pub image_hosts: Vec<String>,
}

/// Row labels that hold each family field. Alternatives are tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldLabels {
    pub birth: Vec<String>,
    pub parents: Vec<String>,
    pub spouse: Vec<String>,
    pub children: Vec<String>,
    pub siblings: Vec<String>,
}

/// A text pattern that switches the relation walker into a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    pub pattern: String,
    pub category: String,
    /// Match the whole text node instead of a substring.
    #[serde(default)]
    pub exact: bool,
}

impl LabelRule {
    pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            category: category.into(),
            exact: false,
        }
    }

    pub fn exact(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            exact: true,
            ..Self::new(pattern, category)
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.exact {
            text.trim() == self.pattern
        } else {
            text.contains(&self.pattern)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationVocabulary {
    pub siblings: Vec<LabelRule>,
    pub parents: Vec<LabelRule>,
}

/// Everything the infobox parser and resolver need to know about a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoboxConfig {
    pub base_url: String,
    /// Disambiguating suffixes appended to a name when the bare title fails.
    #[serde(default)]
    pub title_suffixes: Vec<String>,
    pub locator: LocatorConfig,
    pub markup: MarkupConfig,
    pub fields: FieldLabels,
    pub relations: RelationVocabulary,
}

impl InfoboxConfig {
    /// The embedded default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded JSON is malformed.
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_CONFIG_JSON).expect("failed to parse builtin infobox config")
    }

    /// Reads a configuration file with the same shape as the builtin one.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Default for InfoboxConfig {
    fn default() -> Self {
        Self::builtin()
    }
}
