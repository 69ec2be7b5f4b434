// ABOUTME: Detail extractor: reads a list item, opens its detail view and turns the detail frame into a PlaceRecord.
// ABOUTME: Only entering the detail frame is required; every other field is an optional, timeout-guarded step.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::driver::{script_click, text_of, Driver, ElementHandle, Locator};
use crate::error::{CrawlError, DriverError};
use crate::pacing::Pause;
use crate::record::{canonical_id_from_url, parse_review_count, PlaceRecord, ReviewCounts};
use crate::site::SiteProfile;
use crate::strategy::{evaluate, first_element, Strategy};
use crate::wait::{enter_frame, Wait};

#[derive(Debug, Clone)]
pub struct DetailOptions {
    /// Bound on each attempt to open the detail view.
    pub nav_wait: Wait,
    pub frame_wait: Wait,
    /// Bound on each optional step.
    pub step_wait: Wait,
    /// Pause after the detail view opened.
    pub settle: Pause,
    /// Pause after clicking a tab or control.
    pub click_pause: Pause,
    pub max_tab_pages: usize,
    pub min_visitor_reviews: u32,
    pub min_blog_reviews: u32,
}

impl Default for DetailOptions {
    fn default() -> Self {
        Self {
            nav_wait: Wait::secs(8),
            frame_wait: Wait::secs(10),
            step_wait: Wait::secs(5),
            settle: Pause::millis(2000, 3000),
            click_pause: Pause::millis(150, 350),
            max_tab_pages: 3,
            min_visitor_reviews: 10,
            min_blog_reviews: 50,
        }
    }
}

impl DetailOptions {
    /// Uses one wait for navigation, frames and optional steps.
    pub fn waits(mut self, wait: Wait) -> Self {
        self.nav_wait = wait;
        self.frame_wait = wait;
        self.step_wait = wait;
        self
    }

    pub fn pauses(mut self, pause: Pause) -> Self {
        self.settle = pause;
        self.click_pause = pause;
        self
    }

    /// Minimum review counts; zero for both disables the filter.
    pub fn min_reviews(mut self, visitor: u32, blog: u32) -> Self {
        self.min_visitor_reviews = visitor;
        self.min_blog_reviews = blog;
        self
    }

    pub fn max_tab_pages(mut self, pages: usize) -> Self {
        self.max_tab_pages = pages;
        self
    }

    /// Unread counts count as zero.
    pub fn passes_filter(&self, counts: &ReviewCounts) -> bool {
        counts.visitor.unwrap_or(0) >= self.min_visitor_reviews
            && counts.blog.unwrap_or(0) >= self.min_blog_reviews
    }
}

/// What the list view tells about an item before it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub index: usize,
    pub element: ElementHandle,
    pub name: Option<String>,
    pub category: Option<String>,
    /// Canonical id read from the item's own link, when it has one.
    pub href_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    Accepted(PlaceRecord),
    /// Review counts were below the configured minimums.
    Filtered(PlaceRecord),
}

/// Absence and other per-step failures leave the field unfilled; a dead session is returned.
fn optional_step<T>(stage: &'static str, result: Result<Option<T>, DriverError>) -> Result<Option<T>, DriverError> {
    match result {
        Ok(v) => Ok(v),
        Err(e) if e.is_session_lost() => Err(e),
        Err(e) => {
            debug!(stage, error = %e, "optional step missed");
            Ok(None)
        }
    }
}

fn scoped_text<D: Driver + ?Sized>(
    driver: &mut D,
    scope: &ElementHandle,
    locator: &Locator,
) -> Result<Option<String>, DriverError> {
    match driver.find_elements(Some(scope), locator)?.into_iter().next() {
        Some(el) => text_of(driver, &el),
        None => Ok(None),
    }
}

fn item_href<D: Driver + ?Sized>(
    driver: &mut D,
    scope: &ElementHandle,
    locator: &Locator,
) -> Result<Option<String>, DriverError> {
    match driver.find_elements(Some(scope), locator)?.into_iter().next() {
        Some(a) => driver.element_attr(&a, "href"),
        None => Ok(None),
    }
}

/// Reads name, category and link id of the list item at `index` in the current list frame.
pub fn read_list_item<D: Driver + ?Sized>(
    driver: &mut D,
    site: &SiteProfile,
    id_pattern: &Regex,
    index: usize,
    element: ElementHandle,
) -> Result<ListItem, DriverError> {
    let name = optional_step("item name", scoped_text(driver, &element, &site.item_name))?;
    let category = optional_step("item category", scoped_text(driver, &element, &site.item_category))?;
    let href = optional_step("item href", item_href(driver, &element, &site.item_href))?;
    let href_id = href.and_then(|h| canonical_id_from_url(id_pattern, &h));
    Ok(ListItem {
        index,
        element,
        name,
        category,
        href_id,
    })
}

/// Waits for a detail URL different from `before`; the previous item's URL also carries the marker.
fn wait_for_detail_url<D: Driver + ?Sized>(
    driver: &mut D,
    wait: &Wait,
    marker: &str,
    before: &str,
) -> Result<Option<String>, DriverError> {
    wait.optional("detail url", || {
        let url = driver.current_url()?;
        Ok((url != before && url.contains(marker)).then_some(url))
    })
}

fn try_place_link<D: Driver + ?Sized>(
    driver: &mut D,
    strategy: &Strategy,
    opts: &DetailOptions,
    marker: &str,
    item: &ListItem,
    before: &str,
) -> Result<Option<String>, DriverError> {
    let Some(el) = driver
        .find_elements(Some(&item.element), &strategy.locator)?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };
    if strategy.displayed && !driver.is_displayed(&el)? {
        return Ok(None);
    }
    script_click(driver, &el)?;
    wait_for_detail_url(driver, &opts.nav_wait, marker, before)
}

/// Opens the item's detail view. Returns the detail URL, or `None` when no strategy worked.
///
/// The driver must be inside the list frame. Strategies are tried in
/// order; the item container itself is the last resort.
pub fn open_detail<D: Driver + ?Sized>(
    driver: &mut D,
    site: &SiteProfile,
    opts: &DetailOptions,
    item: &ListItem,
) -> Result<Option<String>, DriverError> {
    let marker = site.detail_url_marker.as_str();
    let before = driver.current_url()?;

    let opened = evaluate(&site.place_links, |s| {
        let attempt = try_place_link(driver, s, opts, marker, item, &before);
        match attempt {
            Err(e) if !e.is_session_lost() => {
                debug!(strategy = %s.locator, error = %e, "place link failed");
                Ok(None)
            }
            other => other,
        }
    })?;

    let url = match opened {
        Some(m) => {
            debug!(index = item.index, strategy = m.index, "detail opened");
            Some(m.value)
        }
        None => {
            debug!(index = item.index, "falling back to clicking the item container");
            let fallback = script_click(driver, &item.element)
                .and_then(|_| wait_for_detail_url(driver, &opts.nav_wait, marker, &before));
            optional_step("item container click", fallback)?
        }
    };

    if url.is_some() {
        opts.settle.sleep();
    }
    Ok(url)
}

fn read_count<D: Driver + ?Sized>(driver: &mut D, wait: &Wait, locator: &Locator) -> Result<Option<u32>, DriverError> {
    let text = wait.optional(&locator.to_string(), || {
        match driver.find_elements(None, locator)?.into_iter().next() {
            Some(el) => Ok(Some(driver.element_text(&el)?)),
            None => Ok(None),
        }
    })?;
    Ok(text.and_then(|t| parse_review_count(&t)))
}

fn read_address<D: Driver + ?Sized>(driver: &mut D, site: &SiteProfile, wait: &Wait) -> Result<Option<String>, DriverError> {
    let spans = wait.optional("address", || {
        let found = driver.find_elements(None, &site.address)?;
        Ok((!found.is_empty()).then_some(found))
    })?;

    let mut first = None;
    for span in spans.unwrap_or_default() {
        let Some(text) = text_of(driver, &span)? else {
            continue;
        };
        if let Some(rest) = text.strip_prefix(site.address_prefix.as_str()) {
            return Ok(Some(rest.trim().to_string()));
        }
        if first.is_none() {
            first = Some(text);
        }
    }
    Ok(first)
}

fn displayed_match<D: Driver + ?Sized>(driver: &mut D, locator: &Locator) -> Result<Option<ElementHandle>, DriverError> {
    for el in driver.find_elements(None, locator)? {
        if driver.is_displayed(&el)? {
            return Ok(Some(el));
        }
    }
    Ok(None)
}

/// Brings the info tab into view and clicks it, paging the tab strip when needed.
fn reveal_info_tab<D: Driver + ?Sized>(driver: &mut D, site: &SiteProfile, opts: &DetailOptions) -> Result<bool, DriverError> {
    let mut tab = opts
        .step_wait
        .optional("info tab", || displayed_match(driver, &site.info_tab))?;

    let mut pages = 0;
    while tab.is_none() && pages < opts.max_tab_pages {
        let Some(next) = first_element(driver, None, &site.tab_next)? else {
            debug!("tab strip has no next control");
            break;
        };
        script_click(driver, &next.value.0)?;
        opts.click_pause.sleep();
        pages += 1;
        tab = displayed_match(driver, &site.info_tab)?;
    }

    let Some(tab) = tab else {
        return Ok(false);
    };
    script_click(driver, &tab)?;
    opts.click_pause.sleep();

    if let Some(more) = displayed_match(driver, &site.more_button)? {
        script_click(driver, &more)?;
        opts.click_pause.sleep();
    }
    Ok(true)
}

fn read_intro<D: Driver + ?Sized>(driver: &mut D, site: &SiteProfile, opts: &DetailOptions) -> Result<Option<String>, DriverError> {
    if !reveal_info_tab(driver, site, opts)? {
        debug!("info tab not found, reading intro from the current view");
    }
    Ok(first_element(driver, None, &site.intro)?.map(|m| m.value.1))
}

fn read_keywords<D: Driver + ?Sized>(driver: &mut D, site: &SiteProfile) -> Result<Vec<String>, DriverError> {
    let mut keywords: Vec<String> = Vec::new();
    for el in driver.find_elements(None, &site.keywords)? {
        if let Some(text) = text_of(driver, &el)? {
            if !keywords.contains(&text) {
                keywords.push(text);
            }
        }
    }
    Ok(keywords)
}

fn read_review_highlights<D: Driver + ?Sized>(
    driver: &mut D,
    site: &SiteProfile,
    opts: &DetailOptions,
) -> Result<Option<Vec<String>>, DriverError> {
    let Some(tab) = opts
        .step_wait
        .optional("review tab", || displayed_match(driver, &site.review_tab))?
    else {
        return Ok(None);
    };
    script_click(driver, &tab)?;
    opts.click_pause.sleep();

    let items = opts.step_wait.optional("review items", || {
        let found = driver.find_elements(None, &site.review_items)?;
        Ok((!found.is_empty()).then_some(found))
    })?;

    let mut highlights = Vec::new();
    for item in items.unwrap_or_default().into_iter().take(site.review_limit) {
        if let Some(text) = scoped_text(driver, &item, &site.review_keyword)? {
            let text = text.trim_matches('"').trim();
            if !text.is_empty() {
                highlights.push(text.to_string());
            }
        }
    }
    Ok(Some(highlights))
}

/// Extracts the opened detail view into a record for `target`.
///
/// Fails with [`CrawlError::FrameUnavailable`] when the detail frame cannot
/// be entered. The driver is left inside the detail frame.
pub fn extract_detail<D: Driver + ?Sized>(
    driver: &mut D,
    site: &SiteProfile,
    opts: &DetailOptions,
    target: &str,
    item: &ListItem,
    canonical_id: String,
) -> Result<DetailOutcome, CrawlError> {
    if !enter_frame(driver, &opts.frame_wait, &site.detail_frame)? {
        return Err(CrawlError::FrameUnavailable(site.detail_frame.clone()));
    }

    let mut record = PlaceRecord {
        canonical_id,
        target_query: target.to_string(),
        name: item.name.clone(),
        category: item.category.clone(),
        ..Default::default()
    };

    record.review_counts = ReviewCounts {
        visitor: optional_step("visitor reviews", read_count(driver, &opts.step_wait, &site.visitor_reviews))?,
        blog: optional_step("blog reviews", read_count(driver, &opts.step_wait, &site.blog_reviews))?,
    };
    if !opts.passes_filter(&record.review_counts) {
        info!(
            query = target,
            id = %record.canonical_id,
            visitor = ?record.review_counts.visitor,
            blog = ?record.review_counts.blog,
            "filtered on review counts"
        );
        return Ok(DetailOutcome::Filtered(record));
    }

    record.address = optional_step("address", read_address(driver, site, &opts.step_wait))?;
    record.intro_text = optional_step("intro", read_intro(driver, site, opts))?;
    record.keywords = optional_step("keywords", read_keywords(driver, site).map(Some))?.unwrap_or_default();
    record.review_highlights =
        optional_step("review highlights", read_review_highlights(driver, site, opts))?.unwrap_or_default();

    if record.address.is_none() {
        warn!(query = target, id = %record.canonical_id, "address not found");
    }
    Ok(DetailOutcome::Accepted(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_treats_missing_counts_as_zero() {
        let opts = DetailOptions::default();
        assert!(opts.passes_filter(&ReviewCounts {
            visitor: Some(10),
            blog: Some(50)
        }));
        assert!(!opts.passes_filter(&ReviewCounts {
            visitor: Some(500),
            blog: None
        }));
        assert!(!opts.passes_filter(&ReviewCounts {
            visitor: Some(9),
            blog: Some(900)
        }));
    }

    #[test]
    fn zero_minimums_disable_the_filter() {
        let opts = DetailOptions::default().min_reviews(0, 0);
        assert!(opts.passes_filter(&ReviewCounts::default()));
    }

    #[test]
    fn optional_step_keeps_session_loss() {
        let missed: Option<u8> = optional_step("x", Err(DriverError::NoSuchElement("a".into()))).unwrap();
        assert_eq!(missed, None);
        assert!(optional_step::<u8>("x", Err(DriverError::NoSession)).is_err());
    }
}
