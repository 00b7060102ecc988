//! Chrome DevTools adapter
//!
//! Implements [`Browser`] and [`WebElement`] on top of chromiumoxide. The adapter
//! attaches to a page that already exists; launching and navigating Chrome is the
//! host's job.

use super::{Browser, ElementHandle, Location, WebElement};
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser as CdpBrowser;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often `wait_for_page_ready` re-reads `document.readyState`
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Protocol error fragments that mean a node or its execution context has gone away
const STALE_MARKERS: &[&str] = &[
    "No node with given id",
    "Could not find node with given id",
    "Could not find object with given id",
    "Cannot find context with specified id",
    "Node is detached from document",
];

/// A Chrome page driven over the DevTools protocol
pub struct ChromeBrowser {
    page: Page,
    // Keeps a self-made connection open for as long as the adapter lives.
    _browser: Option<CdpBrowser>,
}

impl ChromeBrowser {
    /// Wrap a page owned by the caller
    pub fn from_page(page: Page) -> Self {
        Self {
            page,
            _browser: None,
        }
    }

    /// Attach to an already-running Chrome started with `--remote-debugging-port`
    pub async fn connect_debug_port(port: u16) -> Result<Self> {
        let url = format!("http://localhost:{}", port);
        let (browser, mut handler) = CdpBrowser::connect(&url).await.map_err(|e| {
            BrowserError::ConnectionFailed(format!(
                "Failed to connect to Chrome on port {}. \
                 Make sure Chrome is running with --remote-debugging-port={}: {}",
                port, port, e
            ))
        })?;

        // Spawn handler task
        tokio::spawn(async move {
            while (handler.next().await).is_some() {
                // Handle browser events
            }
        });

        let page = Self::active_page(&browser).await?;
        log::debug!("Attached to Chrome on port {}", port);

        Ok(Self {
            page,
            _browser: Some(browser),
        })
    }

    /// The page element queries run against
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// First page that isn't one of Chrome's internal pages, else the most recent page
    async fn active_page(browser: &CdpBrowser) -> Result<Page> {
        let pages = browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        pages.last().cloned().ok_or(BrowserError::NoPage)
    }

    async fn ready_state(&self) -> Result<String> {
        self.page
            .evaluate("document.readyState")
            .await
            .map_err(classify)?
            .into_value::<String>()
            .map_err(|e| BrowserError::Script(format!("Unexpected readyState value: {}", e)))
    }

    fn wrap(elements: Vec<Element>) -> Vec<ElementHandle> {
        elements
            .into_iter()
            .map(|element| Arc::new(ChromeElement::new(element)) as ElementHandle)
            .collect()
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn initialise(&self) -> Result<()> {
        // Fail early if the page connection is already dead.
        let state = self.ready_state().await?;
        log::debug!("Chrome page attached, readyState={}", state);
        Ok(())
    }

    async fn find_elements(&self, css: &str) -> Result<Vec<ElementHandle>> {
        let elements = self.page.find_elements(css).await.map_err(classify)?;
        Ok(Self::wrap(elements))
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        let target = match self.page.find_element(":focus").await {
            Ok(focused) => focused,
            Err(_) => self
                .page
                .find_element("body")
                .await
                .map_err(|_e| BrowserError::ElementNotFound("body".to_string()))?,
        };

        target.type_str(text).await.map_err(classify)?;
        Ok(())
    }

    async fn wait_for_page_ready(&self, cancel: &CancellationToken) -> bool {
        loop {
            match self.ready_state().await {
                Ok(state) if state == "complete" => return true,
                Ok(state) => log::trace!("Page not ready yet (readyState={})", state),
                Err(e) => log::debug!("Could not read page readyState: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(READY_POLL_INTERVAL) => {}
            }
        }
    }
}

/// A DOM element reached through the DevTools protocol
pub struct ChromeElement {
    element: Element,
    id: String,
}

impl ChromeElement {
    pub fn new(element: Element) -> Self {
        let id = element.backend_node_id.inner().to_string();
        Self { element, id }
    }

    /// Call `declaration` with `this` bound to the element and return its primitive result.
    async fn call_fn(&self, declaration: &str) -> Result<Value> {
        let returns = self
            .element
            .call_js_fn(declaration, false)
            .await
            .map_err(classify)?;

        if let Some(details) = returns.exception_details {
            return Err(BrowserError::Script(details.text));
        }

        Ok(returns.result.value.unwrap_or(Value::Null))
    }

    async fn call_bool(&self, declaration: &str) -> Result<bool> {
        match self.call_fn(declaration).await? {
            Value::Bool(b) => Ok(b),
            other => Err(BrowserError::Script(format!(
                "Expected a boolean, got {}",
                other
            ))),
        }
    }
}

impl fmt::Debug for ChromeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromeElement").field("id", &self.id).finish()
    }
}

#[async_trait]
impl WebElement for ChromeElement {
    fn element_id(&self) -> String {
        self.id.clone()
    }

    async fn tag_name(&self) -> Result<String> {
        match self
            .call_fn("function() { return this.tagName.toLowerCase(); }")
            .await?
        {
            Value::String(tag) => Ok(tag),
            other => Err(BrowserError::Script(format!(
                "Expected a tag name, got {}",
                other
            ))),
        }
    }

    async fn text(&self) -> Result<String> {
        let text = self.element.inner_text().await.map_err(classify)?;
        Ok(text.unwrap_or_default())
    }

    async fn is_displayed(&self) -> Result<bool> {
        self.call_bool(
            "function() { \
                const style = window.getComputedStyle(this); \
                return style.display !== 'none' \
                    && style.visibility !== 'hidden' \
                    && this.getClientRects().length > 0; \
            }",
        )
        .await
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.call_bool("function() { return !this.disabled; }").await
    }

    async fn location(&self) -> Result<Location> {
        // Objects only come back by value when serialised, so hand back a JSON string.
        let raw = self
            .call_fn(
                "function() { \
                    const rect = this.getBoundingClientRect(); \
                    return JSON.stringify([rect.x, rect.y]); \
                }",
            )
            .await?;

        let coords: [f64; 2] = raw
            .as_str()
            .ok_or_else(|| BrowserError::Script(format!("Expected a position, got {}", raw)))
            .and_then(|s| {
                serde_json::from_str(s)
                    .map_err(|e| BrowserError::Script(format!("Bad position {}: {}", s, e)))
            })?;

        Ok(Location {
            x: coords[0],
            y: coords[1],
        })
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.element.attribute(name).await.map_err(classify)
    }

    async fn find_elements(&self, css: &str) -> Result<Vec<ElementHandle>> {
        let elements = self.element.find_elements(css).await.map_err(classify)?;
        Ok(ChromeBrowser::wrap(elements))
    }

    async fn click(&self) -> Result<()> {
        self.element.click().await.map_err(classify)?;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.element.focus().await.map_err(classify)?;
        self.element.type_str(text).await.map_err(classify)?;
        Ok(())
    }
}

/// Turn protocol errors about vanished nodes into `StaleElement`
fn classify(err: CdpError) -> BrowserError {
    let message = err.to_string();

    if STALE_MARKERS.iter().any(|marker| message.contains(marker)) {
        BrowserError::StaleElement(message)
    } else {
        BrowserError::Cdp(err)
    }
}
