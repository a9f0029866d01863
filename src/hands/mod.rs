//! Real browser backend: a Chrome tab driven over CDP with `headless_chrome`.

mod scripts;

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::SurfaceError;
use crate::surface::{
    DomEvent, NodeId, PageMetrics, PageSnapshot, PageSurface, PointerKind, Rect,
    SelectOptionInfo,
};

/// Persistent browser session. Created once, reused for all tasks.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    /// Attach to a running Chrome if `attach_url` answers, otherwise launch one.
    pub async fn open(config: &BrowserConfig) -> Result<Self> {
        if let Some(attach_url) = &config.attach_url {
            info!("Attempting to attach to existing Chrome at {}", attach_url);
            match discover_ws_url(attach_url).await {
                Ok(ws_url) => {
                    let session = tokio::task::spawn_blocking(move || Self::attach(ws_url))
                        .await
                        .map_err(|e| anyhow!("Browser attach panicked: {}", e))??;
                    if let Some(url) = &config.start_url {
                        session.goto(url).await?;
                    }
                    return Ok(session);
                }
                Err(e) => warn!("Could not attach: {:#}. Launching a new Chrome", e),
            }
        }

        let config = config.clone();
        tokio::task::spawn_blocking(move || Self::launch(&config))
            .await
            .map_err(|e| anyhow!("Browser launch panicked: {}", e))?
    }

    fn attach(ws_url: String) -> Result<Self> {
        let browser = Browser::connect(ws_url)?;
        info!("Attached to existing Chrome");

        let existing = {
            let tabs = browser
                .get_tabs()
                .lock()
                .map_err(|_| anyhow!("tab list lock poisoned"))?;
            tabs.first().cloned()
        };
        let tab = match existing {
            Some(t) => {
                debug!("Using existing tab");
                t
            }
            None => {
                debug!("No tabs found, creating new one");
                browser.new_tab()?
            }
        };

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn launch(config: &BrowserConfig) -> Result<Self> {
        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-infobars"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        info!("Starting Chrome (headless: {})", config.headless);
        let browser =
            Browser::new(options).map_err(|e| anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        tab.navigate_to(config.start_url.as_deref().unwrap_or("about:blank"))?;
        tab.wait_until_navigated()?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// The current tab as a page automation surface.
    pub fn page(&self) -> ChromePage {
        ChromePage::new(self.tab.clone())
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow!("Navigation task panicked: {}", e))?
    }
}

/// `http://host:port` of a debugging endpoint to its browser WebSocket URL.
async fn discover_ws_url(http_url: &str) -> Result<String> {
    let version: Value = reqwest::Client::new()
        .get(format!("{}/json/version", http_url.trim_end_matches('/')))
        .timeout(Duration::from_secs(2))
        .send()
        .await?
        .json()
        .await?;
    version["webSocketDebuggerUrl"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| anyhow!("no webSocketDebuggerUrl in /json/version"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NodeReply {
    detached: bool,
    error: Option<String>,
    value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RouterReply {
    router: Option<String>,
    error: Option<String>,
}

/// [`PageSurface`] over a Chrome tab.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    /// Evaluate a script that returns a string. CDP calls block, so they run
    /// off the async workers.
    async fn eval(&self, script: String) -> Result<String, SurfaceError> {
        let tab = self.tab.clone();
        let result = tokio::task::spawn_blocking(move || tab.evaluate(&script, false))
            .await
            .map_err(|e| SurfaceError::Browser(format!("evaluation task panicked: {e}")))?
            .map_err(|e| SurfaceError::Script(format!("{e:#}")))?;
        result
            .value
            .and_then(|v| v.as_str().map(String::from))
            .ok_or_else(|| SurfaceError::Script("script returned no value".to_string()))
    }

    async fn call_node(&self, node: NodeId, body: &str) -> Result<Option<Value>, SurfaceError> {
        let script = scripts::NODE_JS
            .replace("__NODE__", &node.to_string())
            .replace("__BODY__", body);
        let reply: NodeReply = serde_json::from_str(&self.eval(script).await?)?;
        if reply.detached {
            return Err(SurfaceError::Detached(node));
        }
        if let Some(error) = reply.error {
            return Err(SurfaceError::Script(error));
        }
        Ok(reply.value)
    }
}

fn js_string(s: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    Value::String(s.to_string()).to_string()
}

fn event_script(event: &DomEvent) -> String {
    let (ctor, init) = match event {
        DomEvent::Pointer { kind, x, y } => {
            let buttons = match kind {
                PointerKind::PointerDown | PointerKind::MouseDown => 1,
                _ => 0,
            };
            let ctor = match kind {
                PointerKind::PointerDown | PointerKind::PointerUp => "PointerEvent",
                _ => "MouseEvent",
            };
            (
                ctor,
                json!({
                    "bubbles": true, "cancelable": true, "composed": true,
                    "clientX": x, "clientY": y, "button": 0, "buttons": buttons,
                    "pointerId": 1, "pointerType": "mouse", "isPrimary": true,
                }),
            )
        }
        DomEvent::MouseOver => ("MouseEvent", json!({"bubbles": true, "cancelable": true})),
        DomEvent::MouseEnter => ("MouseEvent", json!({"bubbles": false})),
        DomEvent::Input => (
            "InputEvent",
            json!({"bubbles": true, "composed": true, "inputType": "insertText"}),
        ),
        DomEvent::Change => ("Event", json!({"bubbles": true})),
        DomEvent::Key { key, .. } => {
            let code = if key == "Enter" { 13 } else { 0 };
            (
                "KeyboardEvent",
                json!({
                    "key": key, "code": key, "keyCode": code, "which": code,
                    "bubbles": true, "cancelable": true,
                }),
            )
        }
    };
    scripts::DISPATCH
        .replace("__CTOR__", &js_string(ctor))
        .replace("__NAME__", &js_string(event.name()))
        .replace("__INIT__", &init.to_string())
}

#[async_trait]
impl PageSurface for ChromePage {
    async fn snapshot(&self) -> Result<PageSnapshot, SurfaceError> {
        let raw = self.eval(scripts::SNAPSHOT_JS.to_string()).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), SurfaceError> {
        self.call_node(node, scripts::SCROLL_INTO_VIEW).await.map(|_| ())
    }

    async fn bounding_rect(&self, node: NodeId) -> Result<Rect, SurfaceError> {
        let value = self
            .call_node(node, scripts::BOUNDING_RECT)
            .await?
            .ok_or_else(|| SurfaceError::Script("no rect returned".to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn focus(&self, node: NodeId) -> Result<(), SurfaceError> {
        self.call_node(node, scripts::FOCUS).await.map(|_| ())
    }

    async fn dispatch(&self, node: NodeId, event: DomEvent) -> Result<(), SurfaceError> {
        self.call_node(node, &event_script(&event)).await.map(|_| ())
    }

    async fn set_native_value(&self, node: NodeId, value: &str) -> Result<(), SurfaceError> {
        let body = scripts::SET_NATIVE_VALUE.replace("__VALUE__", &js_string(value));
        self.call_node(node, &body).await.map(|_| ())
    }

    async fn select_options(&self, node: NodeId) -> Result<Vec<SelectOptionInfo>, SurfaceError> {
        let value = self
            .call_node(node, scripts::SELECT_OPTIONS)
            .await?
            .unwrap_or(Value::Array(Vec::new()));
        Ok(serde_json::from_value(value)?)
    }

    async fn select_index(&self, node: NodeId, index: usize) -> Result<(), SurfaceError> {
        let body = scripts::SELECT_INDEX.replace("__INDEX__", &index.to_string());
        self.call_node(node, &body).await.map(|_| ())
    }

    async fn page_metrics(&self) -> Result<PageMetrics, SurfaceError> {
        let raw = self.eval(scripts::PAGE_METRICS_JS.to_string()).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn scroll_window(&self, dy: f64) -> Result<(), SurfaceError> {
        self.eval(scripts::SCROLL_WINDOW_JS.replace("__DY__", &dy.to_string()))
            .await
            .map(|_| ())
    }

    async fn scroll_element(&self, node: NodeId, dy: f64) -> Result<(), SurfaceError> {
        let body = scripts::SCROLL_ELEMENT.replace("__DY__", &dy.to_string());
        self.call_node(node, &body).await.map(|_| ())
    }

    async fn client_navigate(&self, href: &str) -> Result<Option<String>, SurfaceError> {
        let raw = self
            .eval(scripts::CLIENT_NAVIGATE_JS.replace("__HREF__", &js_string(href)))
            .await?;
        let reply: RouterReply = serde_json::from_str(&raw)?;
        if let Some(error) = reply.error {
            warn!("Client-side router threw: {}", error);
        }
        Ok(reply.router)
    }

    async fn navigate(&self, href: &str) -> Result<(), SurfaceError> {
        let tab = self.tab.clone();
        let href = href.to_string();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            tab.navigate_to(&href)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| SurfaceError::Browser(format!("navigation task panicked: {e}")))?
        .map_err(|e| SurfaceError::Browser(format!("{e:#}")))
    }
}
