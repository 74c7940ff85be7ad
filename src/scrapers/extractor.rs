use crate::models::{page_url, ListingRecord};
use crate::scrapers::rumah123::CatalogLayout;
use crate::scrapers::traits::{PageSession, RenderError, Renderer};
use crate::scrapers::types::ExtractSettings;
use tracing::{debug, error, info, warn};

/// Scrapes every listing card from one catalog page
pub struct PageExtractor<'a> {
    renderer: &'a dyn Renderer,
    layout: &'a CatalogLayout,
    settings: ExtractSettings,
}

impl<'a> PageExtractor<'a> {
    pub fn new(renderer: &'a dyn Renderer, layout: &'a CatalogLayout, settings: ExtractSettings) -> Self {
        Self {
            renderer,
            layout,
            settings,
        }
    }

    /// Extract all listings on `page_number` of `base_url`.
    ///
    /// Never fails: a page that times out, errors, or has no cards yields an
    /// empty result and a diagnostic capture for later inspection.
    pub async fn extract_page(&self, base_url: &str, page_number: u32) -> Vec<ListingRecord> {
        let url = page_url(base_url, page_number);
        info!("Navigating to: {}", url);

        let mut page = match self.renderer.new_page().await {
            Ok(page) => page,
            Err(e) => {
                error!("Could not open a {} page: {}", self.renderer.backend_name(), e);
                return Vec::new();
            }
        };

        let records = match self.scrape(page.as_mut(), &url).await {
            Ok(records) if records.is_empty() => {
                warn!("No listings found on page {}", page_number);
                self.capture_diagnostics(page.as_mut(), page_number).await;
                records
            }
            Ok(records) => {
                info!("Found {} listings on page {}", records.len(), page_number);
                records
            }
            Err(e) => {
                warn!("❌ Page {} failed: {}", page_number, e);
                self.capture_diagnostics(page.as_mut(), page_number).await;
                Vec::new()
            }
        };

        if let Err(e) = page.close().await {
            debug!("Failed to close page {}: {}", page_number, e);
        }
        records
    }

    async fn scrape(&self, page: &mut dyn PageSession, url: &str) -> Result<Vec<ListingRecord>, RenderError> {
        page.goto(url, self.settings.timeout).await?;

        let scroll = self.settings.scroll;
        for step in 0..scroll.steps {
            if let Err(e) = page.scroll_by(scroll.step_px).await {
                debug!("Scroll step {} failed: {}", step + 1, e);
            }
            tokio::time::sleep(scroll.settle).await;
        }

        let html = page.content().await?;
        Ok(self.layout.parse_listings(&html))
    }

    async fn capture_diagnostics(&self, page: &mut dyn PageSession, page_number: u32) {
        let Some(dir) = &self.settings.diagnostics_dir else {
            return;
        };
        let path = dir.join(format!("scraper_debug_page_{}.png", page_number));
        match page.screenshot(&path).await {
            Ok(()) => info!("Saved diagnostic capture to {}", path.display()),
            Err(e) => warn!("Could not capture diagnostics: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;
    use crate::scrapers::fixture::FixtureRenderer;
    use crate::scrapers::rumah123::fixtures::{EMPTY_PAGE, LISTING_PAGE};
    use crate::scrapers::rumah123::LAYOUT;
    use crate::scrapers::types::ScrollPlan;
    use std::path::Path;
    use std::time::Duration;

    const BASE: &str = "https://www.rumah123.com/jual/bogor/rumah";

    fn settings(dir: &Path) -> ExtractSettings {
        ExtractSettings {
            scroll: ScrollPlan {
                settle: Duration::ZERO,
                ..ScrollPlan::default()
            },
            diagnostics_dir: Some(dir.to_path_buf()),
            ..ExtractSettings::default()
        }
    }

    #[tokio::test]
    async fn extracts_records_from_rendered_page() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FixtureRenderer::new().with_page(&format!("{BASE}/?page=2"), LISTING_PAGE);
        let extractor = PageExtractor::new(&renderer, &LAYOUT, settings(dir.path()));

        let records = extractor.extract_page(BASE, 2).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].price, Field::Value(800_000_000));
        assert!(!dir.path().join("scraper_debug_page_2.png").exists());
    }

    #[tokio::test]
    async fn empty_page_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FixtureRenderer::new().with_page(&format!("{BASE}/?page=9"), EMPTY_PAGE);
        let extractor = PageExtractor::new(&renderer, &LAYOUT, settings(dir.path()));

        assert!(extractor.extract_page(BASE, 9).await.is_empty());
        assert!(dir.path().join("scraper_debug_page_9.png").exists());
    }

    #[tokio::test]
    async fn timeout_degrades_to_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FixtureRenderer::new().with_timeout(&format!("{BASE}/?page=3"));
        let extractor = PageExtractor::new(&renderer, &LAYOUT, settings(dir.path()));

        assert!(extractor.extract_page(BASE, 3).await.is_empty());
        assert!(dir.path().join("scraper_debug_page_3.png").exists());
    }
}
