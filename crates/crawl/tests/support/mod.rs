// ABOUTME: Scripted in-process browser used by the crawl integration tests.
// ABOUTME: Models the search page, list frame and detail frame of the builtin site profile without a real browser.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use scout_crawl::driver::{ELEMENT_KEY, KEY_ENTER};
use scout_crawl::{Driver, DriverError, DriverFactory, ElementHandle, Locator, SiteProfile};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct FakePlace {
    pub name: String,
    pub category: String,
    /// Id carried by the list item's own link.
    pub href_id: Option<String>,
    /// Id carried by the detail URL.
    pub url_id: Option<String>,
    pub visitor: Option<u32>,
    pub blog: Option<u32>,
    pub addresses: Vec<String>,
    pub intro: Option<String>,
    pub keywords: Vec<String>,
    pub opens_by: Opening,
    /// Tab-strip pages to flip before the info tab is displayed.
    pub tab_pages: usize,
    /// The intro is only rendered once the info tab was clicked.
    pub intro_behind_tab: bool,
    /// Text the "more" control appends to the intro.
    pub more_text: Option<String>,
    /// Keyword chips on the review tab, rendered with quotes.
    pub highlights: Vec<String>,
}

/// What has to be clicked for the detail view to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    /// The item's place link.
    Link,
    /// Only the item container; its links are inert.
    Container,
    Never,
}

impl FakePlace {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            category: "관광명소".to_string(),
            href_id: Some(id.to_string()),
            url_id: Some(id.to_string()),
            visitor: Some(1234),
            blog: Some(80),
            addresses: vec!["서울 중구 세종대로 99".to_string(), "지번 정동 5-1".to_string()],
            intro: Some(format!("{name} 소개")),
            keywords: vec!["산책".to_string(), "야경".to_string()],
            opens_by: Opening::Link,
            tab_pages: 0,
            intro_behind_tab: false,
            more_text: None,
            highlights: Vec::new(),
        }
    }

    pub fn opens_by(mut self, opening: Opening) -> Self {
        self.opens_by = opening;
        self
    }

    /// Info tab scrolled out of the strip by `pages`, intro only under it.
    pub fn hidden_info_tab(mut self, pages: usize) -> Self {
        self.tab_pages = pages;
        self.intro_behind_tab = true;
        self
    }

    pub fn more_text(mut self, text: &str) -> Self {
        self.more_text = Some(text.to_string());
        self
    }

    pub fn highlights(mut self, chips: &[&str]) -> Self {
        self.highlights = chips.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn without_href(mut self) -> Self {
        self.href_id = None;
        self
    }

    pub fn without_id(mut self) -> Self {
        self.href_id = None;
        self.url_id = None;
        self
    }

    pub fn reviews(mut self, visitor: Option<u32>, blog: Option<u32>) -> Self {
        self.visitor = visitor;
        self.blog = blog;
        self
    }
}

/// State shared by every browser the factory hands out.
#[derive(Debug, Default)]
pub struct FakeWeb {
    /// First result page per query.
    pub results: HashMap<String, Vec<FakePlace>>,
    /// Result pages after the first, per query.
    pub later_pages: HashMap<String, Vec<Vec<FakePlace>>>,
    /// Every submitted query, in order.
    pub searches: Vec<String>,
    /// Names of places whose detail view was opened.
    pub opened: Vec<String>,
    /// Queries whose list frame disappears after the first item.
    pub lose_list_frame: Vec<String>,
    /// Queries that crash the browser when submitted.
    pub crash_on: Vec<String>,
    /// Queries whose list has no scroll container.
    pub no_container: Vec<String>,
    /// When set, the list renders this many more items per scroll.
    pub lazy_batch: Option<usize>,
    /// Scroll steps sent to any list.
    pub scrolls: usize,
    /// Next-page clicks.
    pub page_turns: usize,
}

impl FakeWeb {
    pub fn with(mut self, query: &str, places: Vec<FakePlace>) -> Self {
        self.results.insert(query.to_string(), places);
        self
    }

    pub fn with_pages(mut self, query: &str, mut pages: Vec<Vec<FakePlace>>) -> Self {
        let first = if pages.is_empty() { Vec::new() } else { pages.remove(0) };
        self.results.insert(query.to_string(), first);
        self.later_pages.insert(query.to_string(), pages);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Top,
    List,
    Detail,
}

#[derive(Debug)]
pub struct FakeDriver {
    site: SiteProfile,
    web: Rc<RefCell<FakeWeb>>,
    quits: Rc<Cell<usize>>,
    frame: Frame,
    url: String,
    typed: String,
    query: Option<String>,
    detail: Option<usize>,
    list_entries: usize,
    page: usize,
    /// Scroll steps on the current page.
    scrolled: usize,
    tab_paged: usize,
    info_open: bool,
    expanded: bool,
    reviews_open: bool,
    dead: bool,
}

fn index_of(id: &str, kind: &str) -> Option<usize> {
    let (k, i) = id.split_once(':')?;
    (k == kind).then(|| i.parse().ok()).flatten()
}

impl FakeDriver {
    fn alive(&self) -> Result<(), DriverError> {
        if self.dead {
            Err(DriverError::Transport("browser crashed".into()))
        } else {
            Ok(())
        }
    }

    fn places(&self) -> Vec<FakePlace> {
        let web = self.web.borrow();
        let Some(q) = self.query.as_ref() else {
            return Vec::new();
        };
        if self.page == 0 {
            web.results.get(q).cloned().unwrap_or_default()
        } else {
            web.later_pages
                .get(q)
                .and_then(|pages| pages.get(self.page - 1).cloned())
                .unwrap_or_default()
        }
    }

    /// Items currently rendered in the list, honoring lazy loading.
    fn rendered(&self) -> usize {
        let all = self.places().len();
        match self.web.borrow().lazy_batch {
            Some(batch) => all.min(batch * (self.scrolled + 1)),
            None => all,
        }
    }

    fn has_next_page(&self) -> bool {
        let web = self.web.borrow();
        self.query
            .as_ref()
            .and_then(|q| web.later_pages.get(q))
            .is_some_and(|pages| self.page < pages.len())
    }

    fn has_container(&self) -> bool {
        self.query
            .as_ref()
            .is_some_and(|q| !self.web.borrow().no_container.contains(q))
    }

    fn detail_place(&self) -> Option<FakePlace> {
        self.detail.and_then(|i| self.places().get(i).cloned())
    }

    fn open(&mut self, index: usize) {
        let Some(place) = self.places().get(index).cloned() else {
            return;
        };
        let query = self.query.clone().unwrap_or_default();
        self.url = match &place.url_id {
            Some(id) => format!("https://map.naver.com/p/search/{query}/place/{id}"),
            None => format!("https://map.naver.com/p/search/{query}/place/list-{index}"),
        };
        self.detail = Some(index);
        self.tab_paged = 0;
        self.info_open = false;
        self.expanded = false;
        self.reviews_open = false;
        self.web.borrow_mut().opened.push(place.name);
    }

    fn open_via(&mut self, index: usize, clicked: Opening) {
        let Some(place) = self.places().get(index).cloned() else {
            return;
        };
        if place.opens_by == clicked {
            self.open(index);
        }
    }

    fn info_tab_displayed(&self) -> bool {
        self.detail_place().is_some_and(|p| self.tab_paged >= p.tab_pages)
    }

    fn scoped(&self, scope: &ElementHandle, locator: &Locator) -> Vec<String> {
        let Some(i) = index_of(scope.id(), "item") else {
            return Vec::new();
        };
        let Some(place) = self.places().get(i).cloned() else {
            return Vec::new();
        };
        let s = &self.site;
        if *locator == s.item_name {
            vec![format!("name:{i}")]
        } else if *locator == s.item_category {
            vec![format!("cat:{i}")]
        } else if *locator == s.item_href {
            place.href_id.map(|_| format!("href:{i}")).into_iter().collect()
        } else if *locator == s.place_links[0].locator {
            vec![format!("link:{i}")]
        } else {
            Vec::new()
        }
    }

    fn in_review(&self, scope: &ElementHandle, locator: &Locator) -> Vec<String> {
        match index_of(scope.id(), "rev") {
            Some(k) if *locator == self.site.review_keyword => vec![format!("chip:{k}")],
            _ => Vec::new(),
        }
    }

    fn in_detail(&self, locator: &Locator) -> Vec<String> {
        let Some(place) = self.detail_place() else {
            return Vec::new();
        };
        let s = &self.site;
        if *locator == s.info_tab {
            return vec!["info_tab".to_string()];
        }
        if *locator == s.tab_next[0].locator {
            return (place.tab_pages > 0).then(|| "tab_next".to_string()).into_iter().collect();
        }
        if *locator == s.more_button {
            let shown = self.info_open && place.more_text.is_some() && !self.expanded;
            return shown.then(|| "more".to_string()).into_iter().collect();
        }
        if *locator == s.review_tab {
            return (!place.highlights.is_empty()).then(|| "review_tab".to_string()).into_iter().collect();
        }
        if *locator == s.review_items {
            if !self.reviews_open {
                return Vec::new();
            }
            return (0..place.highlights.len()).map(|k| format!("rev:{k}")).collect();
        }
        if *locator == s.visitor_reviews {
            place.visitor.map(|_| "visitor".to_string()).into_iter().collect()
        } else if *locator == s.blog_reviews {
            place.blog.map(|_| "blog".to_string()).into_iter().collect()
        } else if *locator == s.address {
            (0..place.addresses.len()).map(|k| format!("addr:{k}")).collect()
        } else if *locator == s.intro[0].locator {
            let rendered = !place.intro_behind_tab || self.info_open;
            place.intro.filter(|_| rendered).map(|_| "intro".to_string()).into_iter().collect()
        } else if *locator == s.keywords {
            (0..place.keywords.len()).map(|k| format!("kw:{k}")).collect()
        } else {
            Vec::new()
        }
    }
}

impl Driver for FakeDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.alive()?;
        self.url = url.to_string();
        self.frame = Frame::Top;
        self.query = None;
        self.detail = None;
        self.list_entries = 0;
        self.page = 0;
        self.scrolled = 0;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        self.alive()?;
        Ok(self.url.clone())
    }

    fn find_elements(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        self.alive()?;
        let s = &self.site;
        let ids = match (self.frame, scope) {
            (Frame::Top, None) if *locator == s.search_input => vec!["input".to_string()],
            (Frame::List, None) if *locator == s.scroll_container => {
                self.has_container().then(|| "container".to_string()).into_iter().collect()
            }
            (Frame::List, None) if *locator == s.list_item => {
                (0..self.rendered()).map(|i| format!("item:{i}")).collect()
            }
            (Frame::List, None) if *locator == s.next_page => {
                self.has_next_page().then(|| "next".to_string()).into_iter().collect()
            }
            (Frame::List, Some(scope)) => self.scoped(scope, locator),
            (Frame::Detail, None) => self.in_detail(locator),
            (Frame::Detail, Some(scope)) => self.in_review(scope, locator),
            _ => Vec::new(),
        };
        Ok(ids.into_iter().map(ElementHandle::new).collect())
    }

    fn element_text(&mut self, el: &ElementHandle) -> Result<String, DriverError> {
        self.alive()?;
        let id = el.id();
        let places = self.places();
        if let Some(i) = index_of(id, "name") {
            return Ok(places[i].name.clone());
        }
        if let Some(i) = index_of(id, "cat") {
            return Ok(places[i].category.clone());
        }
        let place = self.detail_place();
        let text = match (id, place) {
            ("visitor", Some(p)) => format!("방문자 리뷰 {}", p.visitor.unwrap_or(0)),
            ("blog", Some(p)) => format!("블로그 리뷰 {}", p.blog.unwrap_or(0)),
            ("intro", Some(p)) => {
                let intro = p.intro.unwrap_or_default();
                match p.more_text {
                    Some(more) if self.expanded => format!("{intro} {more}"),
                    _ => intro,
                }
            }
            (other, Some(p)) => {
                if let Some(k) = index_of(other, "addr") {
                    p.addresses[k].clone()
                } else if let Some(k) = index_of(other, "kw") {
                    p.keywords[k].clone()
                } else if let Some(k) = index_of(other, "chip") {
                    format!("\"{}\"", p.highlights[k])
                } else {
                    String::new()
                }
            }
            _ => String::new(),
        };
        Ok(text)
    }

    fn element_attr(&mut self, el: &ElementHandle, name: &str) -> Result<Option<String>, DriverError> {
        self.alive()?;
        let places = self.places();
        Ok(match (index_of(el.id(), "href"), name) {
            (Some(i), "href") => places[i]
                .href_id
                .as_ref()
                .map(|id| format!("https://map.naver.com/p/entry/place/{id}")),
            _ => None,
        })
    }

    fn is_displayed(&mut self, el: &ElementHandle) -> Result<bool, DriverError> {
        self.alive()?;
        Ok(el.id() != "info_tab" || self.info_tab_displayed())
    }

    fn click(&mut self, el: &ElementHandle) -> Result<(), DriverError> {
        self.alive()?;
        let id = el.id();
        if let Some(i) = index_of(id, "link") {
            self.open_via(i, Opening::Link);
        } else if let Some(i) = index_of(id, "item") {
            self.open_via(i, Opening::Container);
        }
        match id {
            "tab_next" => self.tab_paged += 1,
            "info_tab" if self.info_tab_displayed() => self.info_open = true,
            "more" => self.expanded = true,
            "review_tab" => self.reviews_open = true,
            "next" if self.has_next_page() => {
                self.page += 1;
                self.scrolled = 0;
                self.detail = None;
                self.web.borrow_mut().page_turns += 1;
            }
            _ => {}
        }
        Ok(())
    }

    fn clear(&mut self, _el: &ElementHandle) -> Result<(), DriverError> {
        self.alive()?;
        self.typed.clear();
        Ok(())
    }

    fn send_keys(&mut self, _el: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.alive()?;
        if text != KEY_ENTER {
            self.typed.push_str(text);
            return Ok(());
        }
        let query = self.typed.clone();
        let crash = {
            let mut web = self.web.borrow_mut();
            web.searches.push(query.clone());
            web.crash_on.contains(&query)
        };
        if crash {
            self.dead = true;
            return Err(DriverError::Transport("browser crashed".into()));
        }
        self.url = format!("https://map.naver.com/p/search/{query}");
        self.query = Some(query);
        Ok(())
    }

    fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        self.alive()?;
        if script.contains("scrollBy") {
            self.scrolled += 1;
            self.web.borrow_mut().scrolls += 1;
        }
        if script.contains(".click()") {
            let target = args
                .first()
                .and_then(|a| a.get(ELEMENT_KEY))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            self.click(&ElementHandle::new(target))?;
        }
        Ok(Value::Null)
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.alive()?;
        Ok(Vec::new())
    }

    fn switch_to_frame(&mut self, id: &str) -> Result<bool, DriverError> {
        self.alive()?;
        if id == self.site.list_frame {
            let Some(query) = &self.query else {
                return Ok(false);
            };
            let lost = self.web.borrow().lose_list_frame.contains(query) && self.list_entries >= 1;
            if lost {
                return Ok(false);
            }
            self.list_entries += 1;
            self.frame = Frame::List;
            return Ok(true);
        }
        if id == self.site.detail_frame && self.detail.is_some() {
            self.frame = Frame::Detail;
            return Ok(true);
        }
        Ok(false)
    }

    fn switch_to_default(&mut self) -> Result<(), DriverError> {
        self.alive()?;
        self.frame = Frame::Top;
        Ok(())
    }

    fn window_handles(&mut self) -> Result<Vec<String>, DriverError> {
        self.alive()?;
        Ok(vec!["main".to_string()])
    }

    fn page_source(&mut self) -> Result<String, DriverError> {
        self.alive()?;
        Ok("<html></html>".to_string())
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        self.quits.set(self.quits.get() + 1);
        Ok(())
    }
}

/// Hands out fake browsers over one shared web, counting starts and quits.
#[derive(Clone)]
pub struct FakeFactory {
    pub site: SiteProfile,
    pub web: Rc<RefCell<FakeWeb>>,
    pub created: Rc<Cell<usize>>,
    pub quits: Rc<Cell<usize>>,
    /// Creations that fail before the next one succeeds.
    pub failures: Rc<Cell<usize>>,
    pub always_fail: bool,
}

impl FakeFactory {
    pub fn new(web: FakeWeb) -> Self {
        Self {
            site: SiteProfile::builtin(),
            web: Rc::new(RefCell::new(web)),
            created: Rc::new(Cell::new(0)),
            quits: Rc::new(Cell::new(0)),
            failures: Rc::new(Cell::new(0)),
            always_fail: false,
        }
    }

    pub fn failing_next(self, n: usize) -> Self {
        self.failures.set(n);
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }
}

impl DriverFactory for FakeFactory {
    type Driver = FakeDriver;

    fn create(&mut self) -> Result<FakeDriver, DriverError> {
        if self.always_fail || self.failures.get() > 0 {
            self.failures.set(self.failures.get().saturating_sub(1));
            return Err(DriverError::Transport("chromedriver unreachable".into()));
        }
        self.created.set(self.created.get() + 1);
        Ok(FakeDriver {
            site: self.site.clone(),
            web: Rc::clone(&self.web),
            quits: Rc::clone(&self.quits),
            frame: Frame::Top,
            url: String::new(),
            typed: String::new(),
            query: None,
            detail: None,
            list_entries: 0,
            page: 0,
            scrolled: 0,
            tab_paged: 0,
            info_open: false,
            expanded: false,
            reviews_open: false,
            dead: false,
        })
    }
}
