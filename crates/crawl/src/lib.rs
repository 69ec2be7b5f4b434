// ABOUTME: Library entry point for the region crawl engine driving a map site through W3C WebDriver.
// ABOUTME: Session recycling, query generation, checkpointing, list scrolling, detail extraction and deduped persistence.

pub mod checkpoint;
pub mod crawler;
pub mod detail;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod pacing;
pub mod queries;
pub mod record;
pub mod scroller;
pub mod session;
pub mod site;
pub mod store;
pub mod strategy;
pub mod wait;

pub use checkpoint::Checkpoint;
pub use crawler::{CrawlOptions, Crawler, RunSummary, TargetStats};
pub use detail::{DetailOptions, DetailOutcome, ListItem};
pub use driver::webdriver::{ChromeOptions, WebDriverClient, WebDriverFactory};
pub use driver::{Driver, DriverFactory, ElementHandle, Locator};
pub use error::{ConfigError, CrawlError, DriverError, ErrorKind, StoreError};
pub use gateway::DedupGateway;
pub use pacing::Pause;
pub use queries::{generate_queries, load_queries, DEFAULT_SUFFIX};
pub use record::{PlaceRecord, ReviewCounts};
pub use scroller::{ScrollOptions, ScrollOutcome, StabilityTracker};
pub use session::{Session, SessionOptions};
pub use site::SiteProfile;
pub use store::{MemoryStore, PlaceStore, SqliteStore};
pub use strategy::Strategy;
pub use wait::Wait;
