// ABOUTME: Library entry point for person-infobox extraction from rendered wiki pages.
// ABOUTME: Block scoring, header and relation parsing, title-variant resolution and a per-name profile cache.

pub mod config;
pub mod enrich;
pub mod error;
pub mod fields;
pub mod locator;
pub mod profile;
pub mod relations;
pub mod resolve;
pub mod text;

pub use config::{InfoboxConfig, LabelRule, LocatorConfig};
pub use enrich::{EnrichJob, EnrichOptions, EnrichSummary, ProfileCache, ProfileOrigin};
pub use error::{ConfigError, FetchError, ProfileError};
pub use locator::{BlockLocator, Located, ScoredBlock};
pub use profile::{EntityProfile, Family, Parents, PersonLink, RelationMap};
pub use resolve::{candidate_titles, InfoboxParser, PageSource, Rejection, Resolver};
