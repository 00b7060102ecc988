//! Browser collaborator interface
//!
//! The chain core never talks to a driver directly. It sees the browser through
//! [`Browser`] and the DOM elements it returns through [`WebElement`].

pub mod chrome;

pub use chrome::{ChromeBrowser, ChromeElement};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared handle to a live DOM element
pub type ElementHandle = Arc<dyn WebElement>;

/// Shared handle to the browser session, passed to every node callback
pub type BrowserHandle = Arc<dyn Browser>;

/// Viewport position of an element
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

/// A browser session capable of locating elements and reporting page readiness.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Prepare the session for use. The default does nothing.
    async fn initialise(&self) -> Result<()> {
        Ok(())
    }

    /// Run a CSS query from the document root.
    async fn find_elements(&self, css: &str) -> Result<Vec<ElementHandle>>;

    /// Type onto the page itself (whatever currently has focus).
    async fn send_keys(&self, text: &str) -> Result<()>;

    /// Whether the current page is ready for element queries. Implementations may
    /// wait; the caller bounds the wait and may cancel it.
    async fn wait_for_page_ready(&self, cancel: &CancellationToken) -> bool;
}

/// A handle to one element in the live DOM. Any read can fail with
/// [`BrowserError::StaleElement`](crate::error::BrowserError::StaleElement)
/// once the page re-renders.
#[async_trait]
pub trait WebElement: Send + Sync + fmt::Debug {
    /// Stable identity of the underlying DOM node; two handles to the same node compare equal.
    fn element_id(&self) -> String;

    async fn tag_name(&self) -> Result<String>;

    async fn text(&self) -> Result<String>;

    async fn is_displayed(&self) -> Result<bool>;

    async fn is_enabled(&self) -> Result<bool>;

    async fn location(&self) -> Result<Location>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// Run a CSS query scoped to this element.
    async fn find_elements(&self, css: &str) -> Result<Vec<ElementHandle>>;

    async fn click(&self) -> Result<()>;

    async fn send_keys(&self, text: &str) -> Result<()>;
}
