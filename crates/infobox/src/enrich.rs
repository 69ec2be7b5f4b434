// ABOUTME: Batch profile enrichment: names in, one cached JSON profile per name out.
// ABOUTME: Reuses valid cache entries, optionally refetches bad ones, and paces live fetches with jitter.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::error::ProfileError;
use crate::profile::EntityProfile;
use crate::resolve::{is_valid_profile, PageSource, Resolver};
use crate::text::safe_filename;

/// Header names that usually hold the person's name, most specific first.
pub const DEFAULT_NAME_COLUMNS: &[&str] = &["총수(동일인)", "총수", "동일인", "smerNm", "ceo", "name"];

/// On-disk cache of resolved profiles, one `<name>.json` per person.
#[derive(Debug)]
pub struct ProfileCache {
    dir: PathBuf,
    memo: HashMap<String, EntityProfile>,
}

impl ProfileCache {
    /// Opens (and creates if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ProfileError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            memo: HashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_filename(name)))
    }

    /// Looks a name up in memory, then on disk. Unreadable files count as misses.
    pub fn load(&mut self, name: &str) -> Option<EntityProfile> {
        if let Some(p) = self.memo.get(name) {
            return Some(p.clone());
        }
        let path = self.path_for(name);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<EntityProfile>(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Writes the profile to disk and remembers it for this run.
    pub fn store(&mut self, name: &str, profile: &EntityProfile) -> Result<(), ProfileError> {
        let path = self.path_for(name);
        let json = serde_json::to_string_pretty(profile).map_err(|source| ProfileError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        self.memo.insert(name.to_string(), profile.clone());
        Ok(())
    }

    fn remember(&mut self, name: &str, profile: &EntityProfile) {
        self.memo.insert(name.to_string(), profile.clone());
    }
}

/// Options for [`EnrichJob`].
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Base pause after every live fetch.
    pub sleep: Duration,
    /// Upper bound of the random extra pause added to `sleep`.
    pub jitter: Duration,
    /// Refetch cached entries that carry an error or fail validation.
    pub refresh_bad: bool,
    /// Stop after this many names.
    pub limit: Option<usize>,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            sleep: Duration::from_millis(1200),
            jitter: Duration::from_millis(600),
            refresh_bad: false,
            limit: None,
        }
    }
}

impl EnrichOptions {
    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn refresh_bad(mut self, refresh: bool) -> Self {
        self.refresh_bad = refresh;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    fn pause(&self) -> Duration {
        let extra = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rand::rng().random::<f64>())
        };
        self.sleep + extra
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOrigin {
    Cache,
    Fetched,
}

#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    pub name: String,
    pub profile: EntityProfile,
    pub origin: ProfileOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct EnrichSummary {
    pub outcomes: Vec<EnrichOutcome>,
    pub fetched: usize,
    pub cached: usize,
    pub failed: usize,
}

/// Resolves a list of names through the cache and a [`Resolver`].
pub struct EnrichJob<S> {
    resolver: Resolver<S>,
    cache: ProfileCache,
    opts: EnrichOptions,
}

impl<S: PageSource> EnrichJob<S> {
    pub fn new(resolver: Resolver<S>, cache: ProfileCache, opts: EnrichOptions) -> Self {
        Self {
            resolver,
            cache,
            opts,
        }
    }

    pub fn into_parts(self) -> (Resolver<S>, ProfileCache) {
        (self.resolver, self.cache)
    }

    /// Returns the profile for one name, from cache when the entry is usable.
    ///
    /// A fatal fetch error is returned without touching the cache.
    pub fn profile(&mut self, name: &str) -> Result<(EntityProfile, ProfileOrigin), ProfileError> {
        if let Some(cached) = self.cache.load(name) {
            if self.opts.refresh_bad && !is_valid_profile(name, &cached) {
                info!(name = %name, "refreshing bad cache entry");
            } else {
                self.cache.remember(name, &cached);
                return Ok((cached, ProfileOrigin::Cache));
            }
        }

        let profile = self.resolver.resolve(name)?;
        self.cache.store(name, &profile)?;

        let pause = self.opts.pause();
        if !pause.is_zero() {
            thread::sleep(pause);
        }
        Ok((profile, ProfileOrigin::Fetched))
    }

    /// Processes names in order, skipping blanks and honoring the limit.
    pub fn run<I, N>(&mut self, names: I) -> Result<EnrichSummary, ProfileError>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut summary = EnrichSummary::default();
        for raw in names {
            let name = raw.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if self.opts.limit.is_some_and(|l| summary.outcomes.len() >= l) {
                break;
            }

            let (profile, origin) = self.profile(name)?;
            match origin {
                ProfileOrigin::Cache => summary.cached += 1,
                ProfileOrigin::Fetched => summary.fetched += 1,
            }
            if profile.is_error() {
                summary.failed += 1;
            }
            info!(
                n = summary.outcomes.len() + 1,
                name = %name,
                ok = !profile.is_error(),
                resolved = profile.resolved_title.as_deref().unwrap_or(""),
                "profile done"
            );
            summary.outcomes.push(EnrichOutcome {
                name: name.to_string(),
                profile,
                origin,
            });
        }
        Ok(summary)
    }
}

/// Reads one name per line, ignoring blank lines and `#` comments.
pub fn read_names_lines(path: &Path) -> Result<Vec<String>, ProfileError> {
    let raw = fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(raw
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn normalize_header(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .collect::<String>()
        .to_lowercase()
}

/// Picks the column index for the first candidate that matches a header.
///
/// Matching is exact first, then after dropping whitespace and parentheses
/// (case-insensitive), then by containment of a normalized candidate.
pub fn pick_column<H: AsRef<str>>(headers: &[H], candidates: &[&str]) -> Option<usize> {
    let headers: Vec<&str> = headers.iter().map(|h| h.as_ref().trim()).collect();

    for c in candidates {
        if let Some(i) = headers.iter().position(|h| h == c) {
            return Some(i);
        }
    }

    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    for c in candidates {
        let key = normalize_header(c);
        if let Some(i) = normalized.iter().position(|h| *h == key) {
            return Some(i);
        }
    }

    for (i, h) in normalized.iter().enumerate() {
        if candidates.iter().any(|c| {
            let key = normalize_header(c);
            !key.is_empty() && h.contains(&key)
        }) {
            return Some(i);
        }
    }
    None
}

fn sniff_delimiter(sample: &str) -> u8 {
    let first = sample.lines().next().unwrap_or("");
    [b',', b'\t', b';', b'|']
        .into_iter()
        .max_by_key(|d| first.matches(*d as char).count())
        .filter(|d| first.contains(*d as char))
        .unwrap_or(b',')
}

/// Reads the name column of a delimited file with a header row.
pub fn read_names_csv(path: &Path, candidates: &[&str]) -> Result<Vec<String>, ProfileError> {
    let raw = fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = raw.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(raw))
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let col = pick_column(&headers, candidates).ok_or_else(|| ProfileError::NoNameColumn {
        headers: headers.clone(),
    })?;

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(name) = record.get(col).map(str::trim).filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
