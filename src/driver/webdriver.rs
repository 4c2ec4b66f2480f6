//! [`UiDriver`] over the W3C WebDriver wire protocol.
//!
//! Every command is a blocking HTTP/JSON round trip to a `chromedriver`
//! compatible endpoint. Waits are polled client-side so the timeout semantics
//! stay identical across driver implementations.
//!
//! # Error mapping
//!
//! WebDriver reports failures as `{"value": {"error": <code>, "message": ..}}`.
//! Element-scoped codes (`no such element`, `stale element reference`,
//! `element click intercepted`, ...) become [`Fault::NotFound`]: the page moved
//! under us, which the workflow absorbs per cycle. Transport failures and
//! every other code mean the session can no longer be trusted and become
//! [`Fault::Driver`].
use super::locators::xpath_for;
use super::{ElementHandle, Locator, UiDriver};
use crate::fault::{Fault, FaultResult};
use crate::state::{Cookie, SessionToken};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// W3C element reference key in JSON payloads.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a4b1a1f0a0b";

/// Key codes from the WebDriver key table.
const KEY_CONTROL: char = '\u{E009}';
const KEY_NULL: char = '\u{E000}';
const KEY_DELETE: char = '\u{E017}';

const ELEMENT_SCOPED_ERRORS: [&str; 5] = [
    "no such element",
    "stale element reference",
    "element not interactable",
    "element click intercepted",
    "invalid element state",
];

/// Connection settings for a WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Endpoint root, e.g. `http://localhost:9515`.
    pub url: String,
    /// Extra browser command-line arguments.
    pub browser_args: Vec<String>,
    /// Upper bound on a single HTTP round trip.
    pub request_timeout: Duration,
    /// Interval between probes while waiting on an element.
    pub poll_interval: Duration,
}

/// A live browser session. Dropping it ends the session.
pub struct WebDriverSession {
    agent: ureq::Agent,
    base: String,
    session_id: String,
    poll_interval: Duration,
}

impl std::fmt::Debug for WebDriverSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDriverSession")
            .field("base", &self.base)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

enum Method {
    Get,
    Post(Value),
    Delete,
}

impl WebDriverSession {
    /// Create a new browser session on the endpoint.
    pub fn start(config: &WebDriverConfig) -> FaultResult<Self> {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.request_timeout))
            .build();
        let agent = ureq::Agent::new_with_config(agent_config);
        let base = config.url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": config.browser_args },
                }
            }
        });
        let value = send(&agent, &format!("{base}/session"), Method::Post(capabilities))?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Fault::driver("new session response has no sessionId"))?
            .to_string();
        tracing::info!(%session_id, endpoint = %base, "browser session started");

        Ok(Self {
            agent,
            base,
            session_id,
            poll_interval: config.poll_interval,
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/session/{}/{}", self.base, self.session_id, suffix)
    }

    fn command(&self, suffix: &str, method: Method) -> FaultResult<Value> {
        send(&self.agent, &self.endpoint(suffix), method)
    }

    /// First element matching `locator`, or `None`.
    fn find(&self, locator: &Locator) -> FaultResult<Option<ElementHandle>> {
        let body = json!({ "using": "xpath", "value": xpath_for(locator) });
        match self.command("element", Method::Post(body)) {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(ElementHandle(id.to_string())))
                .ok_or_else(|| Fault::driver("find element response has no element reference")),
            Err(Fault::NotFound { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn element_flag(&self, element: &ElementHandle, flag: &str) -> FaultResult<bool> {
        let value = self.command(&format!("element/{}/{flag}", element.0), Method::Get)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Probe for `locator` until `accept` says yes or `timeout` runs out.
    fn poll_until(
        &self,
        locator: &Locator,
        timeout: Duration,
        accept: impl Fn(&Self, &ElementHandle) -> FaultResult<bool>,
    ) -> FaultResult<ElementHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            let probe = match self.find(locator) {
                Ok(Some(element)) => accept(self, &element).map(|ok| ok.then_some(element)),
                Ok(None) => Ok(None),
                Err(err) => Err(err),
            };
            match probe {
                Ok(Some(element)) => return Ok(element),
                Ok(None) | Err(Fault::NotFound { .. }) => {}
                Err(other) => return Err(other),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Fault::not_found(locator.to_string(), timeout));
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

impl UiDriver for WebDriverSession {
    fn navigate(&mut self, url: &str) -> FaultResult<()> {
        self.command("url", Method::Post(json!({ "url": url })))?;
        Ok(())
    }

    fn refresh(&mut self) -> FaultResult<()> {
        self.command("refresh", Method::Post(json!({})))?;
        Ok(())
    }

    fn wait_for_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> FaultResult<ElementHandle> {
        self.poll_until(locator, timeout, |session, element| {
            session.element_flag(element, "displayed")
        })
    }

    fn wait_for_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> FaultResult<ElementHandle> {
        self.poll_until(locator, timeout, |session, element| {
            Ok(session.element_flag(element, "displayed")?
                && session.element_flag(element, "enabled")?)
        })
    }

    fn wait_for_absent(&mut self, locator: &Locator, timeout: Duration) -> FaultResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let present = match self.find(locator)? {
                Some(element) => match self.element_flag(&element, "displayed") {
                    Ok(shown) => shown,
                    Err(Fault::NotFound { .. }) => false,
                    Err(other) => return Err(other),
                },
                None => false,
            };
            if !present {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Fault::not_found(
                    format!("disappearance of {locator}"),
                    timeout,
                ));
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn click(&mut self, element: &ElementHandle) -> FaultResult<()> {
        self.command(&format!("element/{}/click", element.0), Method::Post(json!({})))?;
        Ok(())
    }

    fn clear(&mut self, element: &ElementHandle) -> FaultResult<()> {
        self.command(&format!("element/{}/clear", element.0), Method::Post(json!({})))?;
        // Content-editable fields ignore the clear command in some builds;
        // select-all + delete covers them.
        let keys = format!("{KEY_CONTROL}a{KEY_NULL}{KEY_DELETE}");
        self.type_text(element, &keys)
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> FaultResult<()> {
        self.command(
            &format!("element/{}/value", element.0),
            Method::Post(json!({ "text": text })),
        )?;
        Ok(())
    }

    fn get_cookies(&mut self) -> FaultResult<SessionToken> {
        let value = self.command("cookie", Method::Get)?;
        let cookies: Vec<Cookie> = serde_json::from_value(value)
            .map_err(|err| Fault::driver(format!("decode cookies: {err}")))?;
        Ok(SessionToken::new(cookies))
    }

    fn set_cookies(&mut self, token: &SessionToken) -> FaultResult<()> {
        for cookie in &token.cookies {
            self.command("cookie", Method::Post(json!({ "cookie": cookie })))?;
        }
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        let url = format!("{}/session/{}", self.base, self.session_id);
        if let Err(err) = send(&self.agent, &url, Method::Delete) {
            tracing::debug!(%err, "failed to end browser session");
        }
    }
}

/// One WebDriver round trip; unwraps the `value` envelope.
fn send(agent: &ureq::Agent, url: &str, method: Method) -> FaultResult<Value> {
    let response = match method {
        Method::Get => agent.get(url).call(),
        Method::Delete => agent.delete(url).call(),
        Method::Post(body) => agent.post(url).send_json(&body),
    };
    let mut response = response.map_err(|err| Fault::driver(format!("{url}: {err}")))?;
    let status = response.status();
    let body: Value = response
        .body_mut()
        .read_json()
        .map_err(|err| Fault::driver(format!("{url}: decode response: {err}")))?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(value);
    }
    Err(classify_error(url, &value))
}

fn classify_error(url: &str, value: &Value) -> Fault {
    let code = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if ELEMENT_SCOPED_ERRORS.contains(&code) {
        return Fault::not_found(format!("{code}: {message}"), Duration::ZERO);
    }
    Fault::driver(format!("{url}: {code}: {message}"))
}
