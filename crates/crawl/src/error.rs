// ABOUTME: Error types for the driver boundary, persistence and crawl orchestration.
// ABOUTME: Every crawl error maps onto one recovery class so callers can decide skip, retry or stop.

use std::path::PathBuf;

use thiserror::Error;

/// W3C error codes that mean the browser session is gone for good.
const SESSION_LOST_CODES: &[&str] = &[
    "invalid session id",
    "session not created",
    "no such window",
    "disconnected",
];

/// Errors raised across the driver capability boundary.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("webdriver transport error: {0}")]
    Transport(String),

    #[error("webdriver error {code} (status {status}): {message}")]
    Protocol {
        status: u16,
        code: String,
        message: String,
    },

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("invalid webdriver response: {0}")]
    InvalidResponse(String),

    #[error("no active browser session")]
    NoSession,
}

impl DriverError {
    /// True when the session cannot be used any more and must be recreated.
    pub fn is_session_lost(&self) -> bool {
        match self {
            DriverError::Transport(_) | DriverError::NoSession => true,
            DriverError::Protocol { code, .. } => SESSION_LOST_CODES.contains(&code.as_str()),
            _ => false,
        }
    }

    /// True for "not there (yet)" conditions a bounded wait may poll through.
    pub fn is_absence(&self) -> bool {
        match self {
            DriverError::NoSuchElement(_) => true,
            DriverError::Protocol { code, .. } => {
                matches!(code.as_str(), "no such element" | "stale element reference" | "no such frame")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        DriverError::Transport(err.to_string())
    }
}

/// Persisted-store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Invalid site profile or crawl input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse site profile: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("invalid region file {path}: {message}")]
    Regions { path: PathBuf, message: String },
}

/// Recovery class of a crawl failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A single network or DOM operation failed; skip the smallest enclosing unit.
    TransientFetch,
    /// The page did not have the expected shape.
    StructuralMismatch,
    /// The browser would not start or stopped responding.
    ResourceExhaustion,
    /// On-disk state could not be read or written.
    PersistenceCorruption,
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("browser failed to start {attempts} times in a row: {last}")]
    DriverExhausted { attempts: u32, last: String },

    #[error("frame {0:?} is not available")]
    FrameUnavailable(String),

    #[error("could not return to the result list frame")]
    ListFrameLost,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CrawlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlError::Driver(e) if e.is_session_lost() => ErrorKind::ResourceExhaustion,
            CrawlError::Driver(_) => ErrorKind::TransientFetch,
            CrawlError::DriverExhausted { .. } => ErrorKind::ResourceExhaustion,
            CrawlError::FrameUnavailable(_) | CrawlError::ListFrameLost => ErrorKind::StructuralMismatch,
            CrawlError::Config(_) => ErrorKind::StructuralMismatch,
            CrawlError::Store(_) | CrawlError::Checkpoint { .. } => ErrorKind::PersistenceCorruption,
        }
    }

    pub fn is_session_lost(&self) -> bool {
        matches!(self, CrawlError::Driver(e) if e.is_session_lost())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_codes_classify_session_loss() {
        let lost = DriverError::Protocol {
            status: 404,
            code: "invalid session id".into(),
            message: "gone".into(),
        };
        assert!(lost.is_session_lost());
        assert_eq!(CrawlError::from(lost).kind(), ErrorKind::ResourceExhaustion);

        let missing = DriverError::Protocol {
            status: 404,
            code: "no such element".into(),
            message: "x".into(),
        };
        assert!(!missing.is_session_lost());
        assert!(missing.is_absence());
        assert_eq!(CrawlError::from(missing).kind(), ErrorKind::TransientFetch);
    }

    #[test]
    fn structural_and_persistence_kinds() {
        assert_eq!(CrawlError::ListFrameLost.kind(), ErrorKind::StructuralMismatch);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = CrawlError::Checkpoint {
            path: "p.json".into(),
            source: io,
        };
        assert_eq!(err.kind(), ErrorKind::PersistenceCorruption);
    }
}
