// ABOUTME: Browser driver capability boundary: element handles, locators and the Driver/DriverFactory traits.
// ABOUTME: The crawler only talks to this trait, so a W3C client and scripted test doubles are interchangeable.

pub mod webdriver;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DriverError;

/// W3C key under which element references travel in JSON.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// The Enter key as a WebDriver key code.
pub const KEY_ENTER: &str = "\u{E007}";

/// Opaque reference to an element in the current browsing context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// The element as a script argument.
    pub fn to_arg(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }
}

/// How to find elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    Xpath(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::Xpath(s.into())
    }

    /// W3C location strategy name.
    pub fn using(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::Xpath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::Xpath(s) => s,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::Xpath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Operations the crawler needs from a browser session.
pub trait Driver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    fn current_url(&mut self) -> Result<String, DriverError>;

    /// Finds matching elements, optionally below `scope`. No match is an empty list.
    fn find_elements(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    fn find_element(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<ElementHandle, DriverError> {
        self.find_elements(scope, locator)?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::NoSuchElement(locator.to_string()))
    }

    fn element_text(&mut self, el: &ElementHandle) -> Result<String, DriverError>;

    fn element_attr(&mut self, el: &ElementHandle, name: &str) -> Result<Option<String>, DriverError>;

    fn is_displayed(&mut self, el: &ElementHandle) -> Result<bool, DriverError>;

    fn click(&mut self, el: &ElementHandle) -> Result<(), DriverError>;

    fn clear(&mut self, el: &ElementHandle) -> Result<(), DriverError>;

    fn send_keys(&mut self, el: &ElementHandle, text: &str) -> Result<(), DriverError>;

    fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value, DriverError>;

    /// PNG bytes of the current viewport.
    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Enters the frame with the given element id. `false` when there is no such frame.
    fn switch_to_frame(&mut self, id: &str) -> Result<bool, DriverError>;

    fn switch_to_default(&mut self) -> Result<(), DriverError>;

    fn window_handles(&mut self) -> Result<Vec<String>, DriverError>;

    fn page_source(&mut self) -> Result<String, DriverError>;

    fn quit(&mut self) -> Result<(), DriverError>;
}

/// Creates browser sessions on demand.
pub trait DriverFactory {
    type Driver: Driver;

    fn create(&mut self) -> Result<Self::Driver, DriverError>;
}

/// Clicks through script, which also works on elements covered by overlays.
pub fn script_click<D: Driver + ?Sized>(driver: &mut D, el: &ElementHandle) -> Result<(), DriverError> {
    driver
        .execute_script("arguments[0].click();", vec![el.to_arg()])
        .map(|_| ())
}

/// Trimmed text of an element, `None` when empty.
pub fn text_of<D: Driver + ?Sized>(driver: &mut D, el: &ElementHandle) -> Result<Option<String>, DriverError> {
    let text = driver.element_text(el)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
