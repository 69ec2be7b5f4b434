// ABOUTME: Error types for infobox configuration, page fetching and profile caching.
// ABOUTME: A failed entity resolution is recorded in the profile itself, not raised as an error.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid locator or markup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    #[error("invalid base url {0:?}")]
    BaseUrl(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A single page fetch failed (network, renderer or driver trouble).
///
/// A fatal error means the source itself is gone and no later fetch can
/// succeed, so callers stop instead of recording a failed profile.
#[derive(Debug, Error)]
#[error("fetch {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
    pub fatal: bool,
}

impl FetchError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            ..Self::new(url, message)
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

/// Errors from the profile cache and batch enrichment job.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no name column among headers {headers:?}")]
    NoNameColumn { headers: Vec<String> },

    #[error("page source unavailable: {0}")]
    SourceUnavailable(#[from] FetchError),
}
