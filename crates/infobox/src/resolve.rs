// ABOUTME: Entity resolution: tries ordered title variants until a page yields a validated person infobox.
// ABOUTME: Pages come from an injected PageSource; a run with no valid variant produces an explicit error profile.

use scraper::Html;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::InfoboxConfig;
use crate::error::{ConfigError, FetchError};
use crate::fields::{FieldReader, HeaderFields};
use crate::locator::{BlockLocator, Located};
use crate::profile::{EntityProfile, Family};
use crate::relations::extract_family;
use crate::text::{clean, normalize_person_name, title_url};

/// Anything that can hand back the rendered HTML of a page.
pub trait PageSource {
    fn fetch(&mut self, url: &str) -> Result<String, FetchError>;
}

impl<S: PageSource + ?Sized> PageSource for &mut S {
    fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        (**self).fetch(url)
    }
}

/// Why a fetched page was not accepted as the entity's profile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("infobox not found/low score({best_score})")]
    NoBlock { best_score: i32 },

    #[error("no strong header")]
    NoHeader,

    #[error("header name {found:?} does not match {expected:?}")]
    NameMismatch { expected: String, found: String },

    #[error("parsed but invalid/empty")]
    NoSubstance,
}

/// Fields pulled from an accepted infobox block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInfobox {
    pub header: HeaderFields,
    pub birth_date: Option<String>,
    pub profile_image: Option<String>,
    pub family: Family,
    pub block_score: i32,
}

/// Title variants to try for a display name, in order.
///
/// A name already ending in one of `suffixes` is tried as is; otherwise the
/// bare name comes first, followed by the name with each suffix appended.
pub fn candidate_titles(name: &str, suffixes: &[String]) -> Vec<String> {
    let name = name.trim();
    if name.is_empty() {
        return Vec::new();
    }
    if suffixes.iter().any(|s| name.ends_with(s.as_str())) {
        return vec![name.to_string()];
    }
    std::iter::once(name.to_string())
        .chain(suffixes.iter().map(|s| format!("{name}{s}")))
        .collect()
}

/// True when one normalized name contains the other.
///
/// An empty expected name accepts anything non-empty.
pub fn names_overlap(expected: &str, found: &str) -> bool {
    let found = normalize_person_name(found);
    if found.is_empty() {
        return false;
    }
    let expected = normalize_person_name(expected);
    expected.is_empty() || found.contains(&expected) || expected.contains(&found)
}

/// Checks a cached or freshly built profile the same way a live page is checked.
pub fn is_valid_profile(expected_name: &str, profile: &EntityProfile) -> bool {
    if profile.is_error() {
        return false;
    }
    let Some(found) = profile.name_local.as_deref() else {
        return false;
    };
    names_overlap(expected_name, found)
        && (profile.birth_date.is_some() || profile.family.has_any_relation())
}

/// Locates and reads the person infobox on a rendered page.
#[derive(Debug, Clone)]
pub struct InfoboxParser {
    cfg: InfoboxConfig,
    locator: BlockLocator,
    reader: FieldReader,
}

impl InfoboxParser {
    pub fn new(cfg: InfoboxConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            locator: BlockLocator::new(&cfg.locator)?,
            reader: FieldReader::new(&cfg)?,
            cfg,
        })
    }

    pub fn config(&self) -> &InfoboxConfig {
        &self.cfg
    }

    /// Page URL for a title on the configured site.
    pub fn title_url(&self, title: &str) -> String {
        title_url(self.reader.base_url(), title)
    }

    /// Parses `html` for `target` and validates the result.
    pub fn parse(&self, html: &str, target: &str) -> Result<ParsedInfobox, Rejection> {
        let doc = Html::parse_document(html);
        let scored = match self.locator.locate(&doc) {
            Located::Found(b) => b,
            Located::BelowThreshold { best_score } => return Err(Rejection::NoBlock { best_score }),
            Located::NoBlocks => return Err(Rejection::NoBlock { best_score: 0 }),
        };
        let block = scored.block;

        let strong = self
            .reader
            .pick_header(&block, target)
            .ok_or(Rejection::NoHeader)?;
        let header = self.reader.header_fields(&strong, target);

        let found = header.name_local.clone().unwrap_or_default();
        if !names_overlap(target, &found) {
            return Err(Rejection::NameMismatch {
                expected: clean(target),
                found,
            });
        }

        let birth_date = self.reader.birth_date(&block, &self.cfg.fields.birth);
        let family = extract_family(&self.reader, &block, &self.cfg);
        if birth_date.is_none() && !family.has_any_relation() {
            return Err(Rejection::NoSubstance);
        }

        Ok(ParsedInfobox {
            header,
            birth_date,
            profile_image: self.reader.profile_image(&block),
            family,
            block_score: scored.score,
        })
    }
}

/// Resolves display names into profiles by walking title variants.
pub struct Resolver<S> {
    parser: InfoboxParser,
    source: S,
}

impl<S: PageSource> Resolver<S> {
    pub fn new(parser: InfoboxParser, source: S) -> Self {
        Self { parser, source }
    }

    pub fn parser(&self) -> &InfoboxParser {
        &self.parser
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Tries each title variant and returns the first validated profile.
    ///
    /// Never substitutes another page's data: when no variant validates,
    /// the result carries an error and every attempted title. Only a fatal
    /// fetch error is returned as `Err`, since no profile can be trusted then.
    pub fn resolve(&mut self, name: &str) -> Result<EntityProfile, FetchError> {
        let name = clean(name);
        let titles = candidate_titles(&name, &self.parser.config().title_suffixes);
        let mut attempted = Vec::with_capacity(titles.len());
        let mut last_err = String::new();

        for title in titles {
            let url = self.parser.title_url(&title);
            attempted.push(title.clone());

            let html = match self.source.fetch(&url) {
                Ok(html) => html,
                Err(e) if e.is_fatal() => {
                    warn!(name = %name, title = %title, error = %e, "page source is gone");
                    return Err(e);
                }
                Err(e) => {
                    warn!(name = %name, title = %title, error = %e, "page fetch failed");
                    last_err = format!("fetch failed for {title}: {}", e.message);
                    continue;
                }
            };

            match self.parser.parse(&html, &name) {
                Ok(parsed) => {
                    info!(name = %name, title = %title, score = parsed.block_score, "profile resolved");
                    return Ok(EntityProfile {
                        resolved_title: Some(title),
                        source_url: url,
                        attempted_titles: attempted,
                        position: parsed.header.position,
                        name_local: parsed.header.name_local,
                        name_alt_script: parsed.header.name_alt_script,
                        name_latin: parsed.header.name_latin,
                        profile_image: parsed.profile_image,
                        birth_date: parsed.birth_date,
                        family: parsed.family,
                        block_score: Some(parsed.block_score),
                        error: None,
                    });
                }
                Err(rejection) => {
                    debug!(name = %name, title = %title, reason = %rejection, "variant rejected");
                    last_err = format!("{rejection} for {title}");
                }
            }
        }

        if last_err.is_empty() {
            last_err = "all candidates failed".to_string();
        }
        warn!(name = %name, attempts = attempted.len(), error = %last_err, "no variant validated");
        Ok(EntityProfile::failed(self.parser.title_url(&name), attempted, last_err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakePages {
        pages: HashMap<String, String>,
        requested: Vec<String>,
    }

    impl FakePages {
        fn with(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    impl PageSource for FakePages {
        fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
            self.requested.push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::new(url, "404"))
        }
    }

    fn infobox(header: &str) -> String {
        format!(
            r#"<table>
                <tr><td colspan="2"><div class="IBdgNaCn"><strong>{header}</strong></div></td></tr>
                <tr><th>출생</th><td>1960년 3월 2일</td></tr>
                <tr><th>배우자</th><td><a class="zkdXfE03" href="/w/S">이영희</a></td></tr>
            </table>"#
        )
    }

    fn parser() -> InfoboxParser {
        InfoboxParser::new(InfoboxConfig::builtin()).unwrap()
    }

    #[test]
    fn candidate_titles_add_suffix_once() {
        let suffixes = vec!["(기업인)".to_string()];
        assert_eq!(
            candidate_titles(" 김철수 ", &suffixes),
            vec!["김철수".to_string(), "김철수(기업인)".to_string()]
        );
        assert_eq!(candidate_titles("김철수(기업인)", &suffixes), vec!["김철수(기업인)".to_string()]);
        assert!(candidate_titles("  ", &suffixes).is_empty());
    }

    #[test]
    fn name_overlap_is_substring_either_way() {
        assert!(names_overlap("김철수", "김철수(기업인)"));
        assert!(names_overlap("김 철수", "김철수"));
        assert!(!names_overlap("김철수", "박영희"));
        assert!(!names_overlap("김철수", ""));
    }

    #[test]
    fn parse_rejects_other_person() {
        let html = infobox("회장<br>박영희");
        let err = parser().parse(&html, "김철수").unwrap_err();
        assert!(matches!(err, Rejection::NameMismatch { .. }));
    }

    #[test]
    fn parse_rejects_image_only_block() {
        let html = r#"<table>
            <tr><td><div class="IBdgNaCn"><strong>회장<br>김철수</strong></div></td></tr>
            <tr><td><img class="xzxn3I3c" src="//i.namu.wiki/a.jpg"></td></tr>
            <tr><th>현직</th><td>회장</td></tr>
        </table>"#;
        let err = parser().parse(html, "김철수").unwrap_err();
        assert_eq!(err, Rejection::NoSubstance);
    }

    #[test]
    fn falls_through_to_suffixed_title() {
        let p = parser();
        let bare = p.title_url("김철수");
        let suffixed = p.title_url("김철수(기업인)");
        let pages = FakePages::default()
            .with(&bare, &infobox("회장<br>박영희"))
            .with(&suffixed, &infobox("○○그룹 회장<br>김철수(기업인)"));

        let mut resolver = Resolver::new(p, pages);
        let profile = resolver.resolve("김철수").unwrap();

        assert!(!profile.is_error());
        assert_eq!(profile.resolved_title.as_deref(), Some("김철수(기업인)"));
        assert_eq!(profile.name_local.as_deref(), Some("김철수(기업인)"));
        assert_eq!(profile.birth_date.as_deref(), Some("1960년 3월 2일"));
        assert_eq!(profile.attempted_titles.len(), 2);
        assert_eq!(profile.source_url, suffixed);
        assert_eq!(resolver.into_source().requested, vec![bare, suffixed]);
    }

    #[test]
    fn all_variants_failing_yields_error_profile() {
        let pages = FakePages::default();
        let mut resolver = Resolver::new(parser(), pages);
        let profile = resolver.resolve("박영희").unwrap();

        assert!(profile.is_error());
        assert_eq!(profile.resolved_title, None);
        assert_eq!(profile.name_local, None);
        assert!(!profile.family.has_any_relation());
        assert_eq!(
            profile.attempted_titles,
            vec!["박영희".to_string(), "박영희(기업인)".to_string()]
        );
        assert!(profile.error.unwrap().contains("박영희(기업인)"));
    }

    struct GoneSource {
        calls: usize,
    }

    impl PageSource for GoneSource {
        fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
            self.calls += 1;
            Err(FetchError::fatal(url, "browser failed to start"))
        }
    }

    #[test]
    fn fatal_fetch_stops_the_variant_walk() {
        let p = parser();
        let bare = p.title_url("박영희");
        let mut resolver = Resolver::new(p, GoneSource { calls: 0 });
        let err = resolver.resolve("박영희").unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(err.url, bare);
        assert_eq!(resolver.into_source().calls, 1);
    }

    #[test]
    fn cached_profile_validation_matches_live_rules() {
        let mut p = EntityProfile {
            name_local: Some("김철수".into()),
            birth_date: Some("1960년 3월 2일".into()),
            ..Default::default()
        };
        assert!(is_valid_profile("김철수", &p));
        assert!(!is_valid_profile("박영희", &p));
        p.birth_date = None;
        p.profile_image = Some("https://i.namu.wiki/a.jpg".into());
        assert!(!is_valid_profile("김철수", &p));
    }
}
