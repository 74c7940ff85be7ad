use crate::models::page_url;
use crate::scrapers::strategy::{element_text, selector};
use crate::scrapers::traits::{PageSession, RenderError, Renderer};
use crate::scrapers::types::DiscoverySettings;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("pagination control not found on {url}")]
    NotFound { url: String },
    #[error("timed out after {after:?} loading {url}")]
    Timeout { url: String, after: Duration },
    #[error("pagination label {label:?} on {url} is not a page number")]
    InvalidLabel { url: String, label: String },
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Reads the page count label out of a rendered listing page.
///
/// This is the only place that knows how the site lays out its pagination.
pub trait PaginationLocator: Send + Sync {
    fn max_page_label(&self, html: &str) -> Option<String>;
}

/// The control just before "next" carries the last page number:
/// `ul.ui-molecule-paginate li:nth-last-child(2) a`
pub struct SecondToLastControl {
    items: Selector,
    link: Selector,
}

impl Default for SecondToLastControl {
    fn default() -> Self {
        Self {
            items: selector("ul.ui-molecule-paginate > li"),
            link: selector("a"),
        }
    }
}

impl PaginationLocator for SecondToLastControl {
    fn max_page_label(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let items: Vec<_> = document.select(&self.items).collect();
        let control = items.len().checked_sub(2).map(|idx| items[idx])?;
        control.select(&self.link).next().map(element_text)
    }
}

/// Finds how many listing pages a region has
pub struct PageRangeDiscoverer<'a> {
    renderer: &'a dyn Renderer,
    locator: Box<dyn PaginationLocator>,
    settings: DiscoverySettings,
}

impl<'a> PageRangeDiscoverer<'a> {
    pub fn new(renderer: &'a dyn Renderer, settings: DiscoverySettings) -> Self {
        Self::with_locator(renderer, settings, Box::new(SecondToLastControl::default()))
    }

    pub fn with_locator(
        renderer: &'a dyn Renderer,
        settings: DiscoverySettings,
        locator: Box<dyn PaginationLocator>,
    ) -> Self {
        Self {
            renderer,
            locator,
            settings,
        }
    }

    /// Render page 1 of `base_url` and read the highest page index.
    /// Never retries; the caller decides what to do with a failure.
    pub async fn discover_max_page(&self, base_url: &str) -> Result<u32, DiscoveryError> {
        let url = page_url(base_url, 1);
        info!("Finding max page number from {}...", url);

        let mut page = self.renderer.new_page().await?;
        let outcome = self.probe(page.as_mut(), &url).await;

        match &outcome {
            Ok(max_page) => info!("✅ Maximum page number found: {}", max_page),
            Err(e) => {
                warn!("❌ {}", e);
                if matches!(e, DiscoveryError::NotFound { .. } | DiscoveryError::Timeout { .. }) {
                    self.capture_diagnostics(page.as_mut()).await;
                }
            }
        }

        if let Err(e) = page.close().await {
            debug!("Failed to close discovery page: {}", e);
        }
        outcome
    }

    async fn probe(&self, page: &mut dyn PageSession, url: &str) -> Result<u32, DiscoveryError> {
        page.goto(url, self.settings.timeout).await.map_err(|e| match e {
            RenderError::Timeout { url, after } => DiscoveryError::Timeout { url, after },
            other => DiscoveryError::Render(other),
        })?;

        page.scroll_to_bottom().await?;
        tokio::time::sleep(self.settings.settle).await;

        let html = page.content().await?;
        let label = self
            .locator
            .max_page_label(&html)
            .ok_or_else(|| DiscoveryError::NotFound { url: url.to_string() })?;

        label
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| DiscoveryError::InvalidLabel {
                url: url.to_string(),
                label,
            })
    }

    async fn capture_diagnostics(&self, page: &mut dyn PageSession) {
        let Some(dir) = &self.settings.diagnostics_dir else {
            return;
        };
        let path = dir.join("max_page_debug.png");
        match page.screenshot(&path).await {
            Ok(()) => info!("Saved diagnostic capture to {}", path.display()),
            Err(e) => warn!("Could not capture diagnostics: {}", e),
        }
    }
}
