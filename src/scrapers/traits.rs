use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("timed out after {after:?} rendering {url}")]
    Timeout { url: String, after: Duration },
    #[error("renderer failed on {url}: {message}")]
    Browser { url: String, message: String },
}

/// Something that can render web pages, e.g. a headless browser.
/// Keeping this behind a trait lets the catalog logic run against fixtures.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh page (browser tab)
    async fn new_page(&self) -> Result<Box<dyn PageSession>, RenderError>;

    /// Get the name of the rendering backend
    fn backend_name(&self) -> &'static str;
}

/// A single open page
#[async_trait]
pub trait PageSession: Send {
    /// Navigate and wait until the page has finished loading, bounded by `timeout`
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    async fn scroll_by(&mut self, px: u32) -> Result<(), RenderError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError>;

    /// Serialized DOM of the current page
    async fn content(&mut self) -> Result<String, RenderError>;

    /// Write a diagnostic capture of the current page to `path`
    async fn screenshot(&mut self, path: &Path) -> Result<(), RenderError>;

    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}
