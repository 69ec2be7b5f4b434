// ABOUTME: Page sources for the profiles commands: a browser-rendered source and a saved-HTML source.
// ABOUTME: The rendered source expands collapsed infobox rows before taking the page source.

use std::thread;
use std::time::Duration;

use scout_crawl::driver::webdriver::WebDriverClient;
use scout_crawl::{Driver, DriverError, Session, Wait, WebDriverFactory};
use scout_infobox::{FetchError, PageSource};
use tracing::warn;

/// Opens folded sections so relation rows are present in the markup.
const EXPAND_SCRIPT: &str = r#"
document.querySelectorAll('table details').forEach(d => { d.open = true; });
document.querySelectorAll('table dl.VtrGmvDQ dt').forEach(dt => {
  try { dt.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true })); } catch (e) {}
});
"#;

/// Fetches pages through a real browser session.
pub struct RenderedPages {
    session: Session<WebDriverFactory>,
    ready: Wait,
    settle: Duration,
}

impl RenderedPages {
    pub fn new(session: Session<WebDriverFactory>) -> Self {
        Self {
            session,
            ready: Wait::secs(10),
            settle: Duration::from_millis(250),
        }
    }

    pub fn close(mut self) {
        if let Err(e) = self.session.close() {
            warn!(error = %e, "browser did not quit cleanly");
        }
    }

    fn render(driver: &mut WebDriverClient, url: &str, ready: &Wait, settle: Duration) -> Result<String, DriverError> {
        driver.navigate(url)?;
        ready.optional("document ready", || {
            let state = driver.execute_script("return document.readyState", Vec::new())?;
            Ok((state.as_str() == Some("complete")).then_some(()))
        })?;
        driver.execute_script(EXPAND_SCRIPT, Vec::new())?;
        thread::sleep(settle);
        driver.page_source()
    }
}

impl PageSource for RenderedPages {
    fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        // the session bounds consecutive start failures; past it the browser is gone for good
        while !self.session.is_alive() {
            if let Err(e) = self.session.acquire() {
                return Err(FetchError::fatal(url, e.to_string()));
            }
        }
        let driver = match self.session.acquire() {
            Ok(Some(driver)) => driver,
            Ok(None) => return Err(FetchError::new(url, "browser unavailable")),
            Err(e) => return Err(FetchError::fatal(url, e.to_string())),
        };
        match Self::render(driver, url, &self.ready, self.settle) {
            Ok(html) => Ok(html),
            Err(e) => {
                if e.is_session_lost() {
                    self.session.invalidate();
                }
                Err(FetchError::new(url, e.to_string()))
            }
        }
    }
}

/// Serves one saved page for every title, for parsing offline captures.
pub struct SavedPage {
    html: String,
}

impl SavedPage {
    pub fn new(html: String) -> Self {
        Self { html }
    }
}

impl PageSource for SavedPage {
    fn fetch(&mut self, _url: &str) -> Result<String, FetchError> {
        Ok(self.html.clone())
    }
}
