// ABOUTME: Blocking W3C WebDriver client speaking JSON over HTTP to a chromedriver endpoint.
// ABOUTME: Maps protocol error payloads onto DriverError and exposes a factory for the session manager.

use std::time::Duration;

use base64::Engine as _;
use reqwest::blocking::{Client, Response};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{Driver, DriverFactory, ElementHandle, Locator, ELEMENT_KEY};
use crate::error::DriverError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9515";

/// Chrome launch options sent as `goog:chromeOptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromeOptions {
    pub headless: bool,
    pub args: Vec<String>,
    #[serde(default)]
    pub binary: Option<String>,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        let args = [
            "--start-maximized",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--window-size=1920,1080",
            "--disable-gpu",
            "--disable-blink-features=AutomationControlled",
            "--log-level=3",
            "--memory-pressure-off",
            "--disable-background-timer-throttling",
            "--disable-renderer-backgrounding",
            "--disable-backgrounding-occluded-windows",
            "--disable-features=TranslateUI,VizDisplayCompositor",
            "--lang=ko-KR",
        ];
        Self {
            headless: false,
            args: args.iter().map(|s| s.to_string()).collect(),
            binary: None,
        }
    }
}

impl ChromeOptions {
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    fn capabilities(&self) -> Value {
        let mut args = self.args.clone();
        if self.headless {
            args.push("--headless=new".to_string());
        }
        let mut chrome = json!({
            "args": args,
            "excludeSwitches": ["enable-automation", "enable-logging"],
            "useAutomationExtension": false,
        });
        if let Some(binary) = &self.binary {
            chrome["binary"] = Value::String(binary.clone());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "normal",
                    "timeouts": { "pageLoad": 60_000, "script": 30_000 },
                    "goog:chromeOptions": chrome,
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct W3cError {
    error: String,
    #[serde(default)]
    message: String,
}

/// One live WebDriver session.
#[derive(Debug)]
pub struct WebDriverClient {
    http: Client,
    base: String,
    session: Option<String>,
}

impl WebDriverClient {
    /// Opens a new session against `endpoint`.
    pub fn start(endpoint: &str, chrome: &ChromeOptions, timeout: Duration) -> Result<Self, DriverError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DriverError::Transport(e.to_string()))?;
        let mut client = Self {
            http,
            base: endpoint.trim_end_matches('/').to_string(),
            session: None,
        };

        let value = client.send(Method::POST, "/session".to_string(), Some(chrome.capabilities()))?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::InvalidResponse("missing sessionId".into()))?;
        info!(session = id, endpoint = %client.base, "webdriver session started");
        client.session = Some(id.to_string());
        Ok(client)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn session_path(&self, suffix: &str) -> Result<String, DriverError> {
        let id = self.session.as_deref().ok_or(DriverError::NoSession)?;
        Ok(format!("/session/{id}{suffix}"))
    }

    fn send(&self, method: Method, path: String, body: Option<Value>) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.base, path);
        debug!(%method, %url, "webdriver request");
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send()?;
        Self::read_value(resp)
    }

    fn read_value(resp: Response) -> Result<Value, DriverError> {
        let status = resp.status();
        let body: Value = resp
            .json()
            .map_err(|e| DriverError::InvalidResponse(e.to_string()))?;
        let value = body.get("value").cloned().unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(value);
        }
        match serde_json::from_value::<W3cError>(value) {
            Ok(err) if err.error == "no such element" => Err(DriverError::NoSuchElement(err.message)),
            Ok(err) => Err(DriverError::Protocol {
                status: status.as_u16(),
                code: err.error,
                message: err.message,
            }),
            Err(_) => Err(DriverError::Protocol {
                status: status.as_u16(),
                code: "unknown error".into(),
                message: body.to_string(),
            }),
        }
    }

    fn element_from(value: &Value) -> Result<ElementHandle, DriverError> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(ElementHandle::new)
            .ok_or_else(|| DriverError::InvalidResponse(format!("not an element reference: {value}")))
    }

    fn get(&self, suffix: &str) -> Result<Value, DriverError> {
        self.send(Method::GET, self.session_path(suffix)?, None)
    }

    fn post(&self, suffix: &str, body: Value) -> Result<Value, DriverError> {
        self.send(Method::POST, self.session_path(suffix)?, Some(body))
    }
}

impl Driver for WebDriverClient {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.post("/url", json!({ "url": url })).map(|_| ())
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        let v = self.get("/url")?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::InvalidResponse("url is not a string".into()))
    }

    fn find_elements(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let suffix = match scope {
            Some(el) => format!("/element/{}/elements", el.id()),
            None => "/elements".to_string(),
        };
        let v = self.post(&suffix, json!({ "using": locator.using(), "value": locator.value() }))?;
        v.as_array()
            .ok_or_else(|| DriverError::InvalidResponse("elements is not an array".into()))?
            .iter()
            .map(Self::element_from)
            .collect()
    }

    fn element_text(&mut self, el: &ElementHandle) -> Result<String, DriverError> {
        let v = self.get(&format!("/element/{}/text", el.id()))?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    fn element_attr(&mut self, el: &ElementHandle, name: &str) -> Result<Option<String>, DriverError> {
        let v = self.get(&format!("/element/{}/attribute/{}", el.id(), name))?;
        Ok(v.as_str().map(str::to_string))
    }

    fn is_displayed(&mut self, el: &ElementHandle) -> Result<bool, DriverError> {
        let v = self.get(&format!("/element/{}/displayed", el.id()))?;
        Ok(v.as_bool().unwrap_or(false))
    }

    fn click(&mut self, el: &ElementHandle) -> Result<(), DriverError> {
        self.post(&format!("/element/{}/click", el.id()), json!({})).map(|_| ())
    }

    fn clear(&mut self, el: &ElementHandle) -> Result<(), DriverError> {
        self.post(&format!("/element/{}/clear", el.id()), json!({})).map(|_| ())
    }

    fn send_keys(&mut self, el: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.post(&format!("/element/{}/value", el.id()), json!({ "text": text }))
            .map(|_| ())
    }

    fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        self.post("/execute/sync", json!({ "script": script, "args": args }))
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        let v = self.get("/screenshot")?;
        let encoded = v
            .as_str()
            .ok_or_else(|| DriverError::InvalidResponse("screenshot is not a string".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::InvalidResponse(e.to_string()))
    }

    fn switch_to_frame(&mut self, id: &str) -> Result<bool, DriverError> {
        let frames = self.find_elements(None, &Locator::css(format!("iframe[id=\"{id}\"]")))?;
        let Some(frame) = frames.into_iter().next() else {
            return Ok(false);
        };
        match self.post("/frame", json!({ "id": frame.to_arg() })) {
            Ok(_) => Ok(true),
            Err(e) if e.is_absence() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn switch_to_default(&mut self) -> Result<(), DriverError> {
        self.post("/frame", json!({ "id": null })).map(|_| ())
    }

    fn window_handles(&mut self) -> Result<Vec<String>, DriverError> {
        let v = self.get("/window/handles")?;
        Ok(v.as_array()
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn page_source(&mut self) -> Result<String, DriverError> {
        let v = self.get("/source")?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        let Some(id) = self.session.take() else {
            return Ok(());
        };
        self.send(Method::DELETE, format!("/session/{id}"), None)?;
        info!(session = %id, "webdriver session closed");
        Ok(())
    }
}

/// Starts Chrome sessions through a chromedriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    pub endpoint: String,
    pub chrome: ChromeOptions,
    pub timeout: Duration,
}

impl WebDriverFactory {
    pub fn new(endpoint: impl Into<String>, chrome: ChromeOptions) -> Self {
        Self {
            endpoint: endpoint.into(),
            chrome,
            timeout: Duration::from_secs(90),
        }
    }
}

impl DriverFactory for WebDriverFactory {
    type Driver = WebDriverClient;

    fn create(&mut self) -> Result<WebDriverClient, DriverError> {
        WebDriverClient::start(&self.endpoint, &self.chrome, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_flag_is_appended_to_args() {
        let caps = ChromeOptions::default().headless(true).capabilities();
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert!(args.iter().any(|a| a == "--disable-blink-features=AutomationControlled"));
    }

    #[test]
    fn default_options_are_headed() {
        let caps = ChromeOptions::default().capabilities();
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(!args.iter().any(|a| a == "--headless=new"));
    }
}
