// ABOUTME: Crawl orchestrator: runs every remaining target through search, list paging and detail extraction.
// ABOUTME: Flushes the gateway after each target and checkpoints only targets whose items were all attempted.

use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::detail::{extract_detail, open_detail, read_list_item, DetailOptions, DetailOutcome};
use crate::driver::{script_click, Driver, DriverFactory, KEY_ENTER};
use crate::error::CrawlError;
use crate::gateway::DedupGateway;
use crate::pacing::Pause;
use crate::record::{canonical_id_from_url, synthetic_id};
use crate::scroller::{scroll_list, ScrollOptions};
use crate::session::{Session, SessionOptions};
use crate::site::SiteProfile;
use crate::store::PlaceStore;
use crate::wait::{enter_frame, wait_for_element, Wait};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Result pages visited per target.
    pub max_pages: usize,
    pub search_wait: Wait,
    pub frame_wait: Wait,
    /// After loading the search page.
    pub load_pause: Pause,
    /// After submitting a query.
    pub search_pause: Pause,
    /// After moving to the next result page.
    pub page_pause: Pause,
    /// Between targets.
    pub target_pause: Pause,
    pub scroll: ScrollOptions,
    pub detail: DetailOptions,
    pub session: SessionOptions,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 1,
            search_wait: Wait::secs(15),
            frame_wait: Wait::secs(10),
            load_pause: Pause::millis(2000, 3000),
            search_pause: Pause::millis(3000, 4000),
            page_pause: Pause::millis(2000, 3000),
            target_pause: Pause::millis(3000, 5000),
            scroll: ScrollOptions::default(),
            detail: DetailOptions::default(),
            session: SessionOptions::default(),
        }
    }
}

impl CrawlOptions {
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    pub fn recycle_every(mut self, targets: usize) -> Self {
        self.session.recycle_every = targets;
        self
    }

    pub fn detail(mut self, detail: DetailOptions) -> Self {
        self.detail = detail;
        self
    }

    /// Removes every pacing pause and makes every wait a single check.
    pub fn without_delays(mut self) -> Self {
        let none = Pause::none();
        let now = Wait::immediate();
        self.search_wait = now;
        self.frame_wait = now;
        self.load_pause = none;
        self.search_pause = none;
        self.page_pause = none;
        self.target_pause = none;
        self.scroll.container_wait = now;
        self.scroll.pause = none;
        self.detail = self.detail.waits(now).pauses(none);
        self
    }
}

/// Per-target counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TargetStats {
    pub pages: usize,
    pub items: usize,
    pub staged: usize,
    pub known: usize,
    pub filtered: usize,
    pub failed: usize,
}

impl TargetStats {
    fn absorb(&mut self, other: &TargetStats) {
        self.pages += other.pages;
        self.items += other.items;
        self.staged += other.staged;
        self.known += other.known;
        self.filtered += other.filtered;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Targets skipped because the checkpoint already had them.
    pub already_done: usize,
    pub completed: usize,
    pub aborted: usize,
    /// Targets skipped because no browser could be started.
    pub skipped: usize,
    pub written: usize,
    pub totals: TargetStats,
}

enum ItemOutcome {
    Staged,
    /// Already in the store or handled earlier in this run.
    Known,
    Filtered,
    Unopened,
    /// The list shrank under us.
    Vanished,
}

/// Borrowed pieces a single target needs.
struct TargetRun<'a, S> {
    site: &'a SiteProfile,
    opts: &'a CrawlOptions,
    id_pattern: &'a Regex,
    gateway: &'a mut DedupGateway<S>,
    stats: TargetStats,
}

impl<S: PlaceStore> TargetRun<'_, S> {
    fn crawl<D: Driver + ?Sized>(&mut self, driver: &mut D, target: &str) -> Result<(), CrawlError> {
        let site = self.site;
        driver.navigate(&site.search_url)?;
        self.opts.load_pause.sleep();

        let input = wait_for_element(driver, &self.opts.search_wait, None, &site.search_input)?;
        driver.clear(&input)?;
        driver.send_keys(&input, target)?;
        driver.send_keys(&input, KEY_ENTER)?;
        self.opts.search_pause.sleep();

        if !enter_frame(driver, &self.opts.frame_wait, &site.list_frame)? {
            return Err(CrawlError::FrameUnavailable(site.list_frame.clone()));
        }

        for page in 1..=self.opts.max_pages {
            let scrolled = scroll_list(driver, site, &self.opts.scroll)?;
            let count = driver.find_elements(None, &site.list_item)?.len();
            debug!(query = target, page, count, outcome = ?scrolled, "list loaded");
            if count == 0 {
                info!(query = target, page, "no items on page");
                break;
            }
            self.stats.pages += 1;

            for index in 0..count {
                match self.item(driver, target, index) {
                    Ok(outcome) => self.count(outcome),
                    Err(e) if e.is_session_lost() => return Err(e),
                    Err(e) => {
                        warn!(query = target, item = index, kind = ?e.kind(), error = %e, "item failed");
                        self.stats.items += 1;
                        self.stats.failed += 1;
                    }
                }
                if !enter_frame(driver, &self.opts.frame_wait, &site.list_frame)? {
                    return Err(CrawlError::ListFrameLost);
                }
            }

            if page < self.opts.max_pages {
                let Some(next) = driver.find_elements(None, &site.next_page)?.into_iter().next() else {
                    info!(query = target, page, "no further result pages");
                    break;
                };
                script_click(driver, &next)?;
                self.opts.page_pause.sleep();
            }
        }
        Ok(())
    }

    fn count(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Vanished => return,
            ItemOutcome::Staged => self.stats.staged += 1,
            ItemOutcome::Known => self.stats.known += 1,
            ItemOutcome::Filtered => self.stats.filtered += 1,
            ItemOutcome::Unopened => self.stats.failed += 1,
        }
        self.stats.items += 1;
    }

    fn item<D: Driver + ?Sized>(&mut self, driver: &mut D, target: &str, index: usize) -> Result<ItemOutcome, CrawlError> {
        let site = self.site;
        // handles from before the last navigation are stale
        let Some(element) = driver.find_elements(None, &site.list_item)?.into_iter().nth(index) else {
            return Ok(ItemOutcome::Vanished);
        };
        let item = read_list_item(driver, site, self.id_pattern, index, element)?;

        if let Some(id) = &item.href_id {
            if !self.gateway.should_fetch(id) {
                debug!(query = target, item = index, id = %id, "known place, not opening");
                return Ok(ItemOutcome::Known);
            }
        }

        let Some(url) = open_detail(driver, site, &self.opts.detail, &item)? else {
            warn!(query = target, item = index, name = ?item.name, "could not open detail view");
            return Ok(ItemOutcome::Unopened);
        };

        let canonical_id = match &item.href_id {
            Some(id) => id.clone(),
            None => {
                let id = match canonical_id_from_url(self.id_pattern, &url) {
                    Some(id) => id,
                    None => {
                        let id = synthetic_id(target, item.name.as_deref(), item.category.as_deref());
                        warn!(query = target, item = index, url = %url, id = %id, "no canonical id, using synthetic id");
                        id
                    }
                };
                if !self.gateway.should_fetch(&id) {
                    debug!(query = target, item = index, id = %id, "known place");
                    return Ok(ItemOutcome::Known);
                }
                id
            }
        };

        match extract_detail(driver, site, &self.opts.detail, target, &item, canonical_id)? {
            DetailOutcome::Accepted(record) => {
                info!(query = target, item = index, id = %record.canonical_id, name = ?record.name, "place extracted");
                self.gateway.stage(record);
                Ok(ItemOutcome::Staged)
            }
            DetailOutcome::Filtered(_) => Ok(ItemOutcome::Filtered),
        }
    }
}

/// Drives a whole run: one session, one gateway, one checkpoint.
pub struct Crawler<F: DriverFactory, S: PlaceStore> {
    site: SiteProfile,
    id_pattern: Regex,
    opts: CrawlOptions,
    session: Session<F>,
    gateway: DedupGateway<S>,
    checkpoint: Checkpoint,
}

impl<F: DriverFactory, S: PlaceStore> Crawler<F, S> {
    pub fn new(
        site: SiteProfile,
        factory: F,
        store: S,
        checkpoint: Checkpoint,
        opts: CrawlOptions,
    ) -> Result<Self, CrawlError> {
        let id_pattern = site.detail_regex()?;
        let session = Session::new(factory, opts.session);
        Ok(Self {
            site,
            id_pattern,
            opts,
            session,
            gateway: DedupGateway::new(store),
            checkpoint,
        })
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn store(&self) -> &S {
        self.gateway.store()
    }

    pub fn session(&self) -> &Session<F> {
        &self.session
    }

    /// Crawls every target the checkpoint does not list yet.
    ///
    /// Only a run of browser start failures is fatal. Aborted targets are
    /// logged, flushed and left out of the checkpoint so the next run
    /// retries them.
    pub fn run(&mut self, targets: &[String]) -> Result<RunSummary, CrawlError> {
        let remaining: Vec<String> = self.checkpoint.remaining(targets).into_iter().cloned().collect();
        let mut summary = RunSummary {
            already_done: targets.len() - remaining.len(),
            ..Default::default()
        };
        info!(total = targets.len(), remaining = remaining.len(), "starting crawl");

        for (index, target) in remaining.iter().enumerate() {
            if index > 0 {
                self.opts.target_pause.sleep();
            }
            info!(index = index + 1, total = remaining.len(), query = %target, "crawling target");

            self.session.ensure_fresh(index);
            let Some(driver) = self.session.acquire()? else {
                warn!(query = %target, "no browser available, skipping target");
                summary.skipped += 1;
                continue;
            };

            let mut run = TargetRun {
                site: &self.site,
                opts: &self.opts,
                id_pattern: &self.id_pattern,
                gateway: &mut self.gateway,
                stats: TargetStats::default(),
            };
            let result = run.crawl(driver, target);
            let stats = run.stats;
            summary.totals.absorb(&stats);

            let flushed = self.gateway.flush();
            if let Ok(written) = &flushed {
                summary.written += written;
            }

            match (result, flushed) {
                (Ok(()), Ok(written)) => {
                    info!(query = %target, written, stats = ?stats, "target complete");
                    summary.completed += 1;
                    if let Err(e) = self.checkpoint.mark_done(target) {
                        error!(query = %target, error = %e, "checkpoint save failed");
                    }
                }
                (Ok(()), Err(e)) => {
                    error!(query = %target, error = %e, "flush failed, target not checkpointed");
                    summary.aborted += 1;
                }
                (Err(e), flushed) => {
                    error!(query = %target, kind = ?e.kind(), error = %e, stats = ?stats, "target aborted");
                    if let Err(fe) = flushed {
                        error!(query = %target, error = %fe, "flush after abort failed");
                    }
                    if e.is_session_lost() {
                        self.session.invalidate();
                    }
                    summary.aborted += 1;
                }
            }
        }

        if let Err(e) = self.session.close() {
            warn!(error = %e, "browser did not quit cleanly");
        }
        info!(
            completed = summary.completed,
            aborted = summary.aborted,
            skipped = summary.skipped,
            written = summary.written,
            "crawl finished"
        );
        Ok(summary)
    }
}
