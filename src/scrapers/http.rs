use crate::scrapers::traits::{PageSession, RenderError, Renderer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Renderer that fetches raw HTML without running scripts.
///
/// Cheaper than Chrome, but lazy-loaded cards never appear, so scrolling is a
/// no-op and diagnostics are HTML snapshots instead of screenshots.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, RenderError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            url: String::new(),
            html: None,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

struct HttpPage {
    client: Client,
    url: String,
    html: Option<String>,
}

impl HttpPage {
    fn error(&self, message: impl Into<String>) -> RenderError {
        RenderError::Browser {
            url: self.url.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl PageSession for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        self.url = url.to_string();
        self.html = None;
        debug!("Fetching URL: {}", url);

        let timed_out = |e: &reqwest::Error| e.is_timeout();
        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) if timed_out(&e) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                    after: timeout,
                })
            }
            Err(e) => return Err(self.error(e.to_string())),
        };

        if !response.status().is_success() {
            warn!("{} returned status: {}", url, response.status());
            return Err(self.error(format!("HTTP status {}", response.status())));
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) if timed_out(&e) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                    after: timeout,
                })
            }
            Err(e) => return Err(self.error(format!("Failed to read response body: {}", e))),
        };
        debug!("Downloaded {} bytes of HTML", html.len());
        self.html = Some(html);
        Ok(())
    }

    async fn scroll_by(&mut self, _px: u32) -> Result<(), RenderError> {
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.html.clone().ok_or_else(|| self.error("no page loaded"))
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), RenderError> {
        let snapshot = path.with_extension("html");
        if let Some(parent) = snapshot.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let body = self.html.as_deref().unwrap_or_default();
        tokio::fs::write(&snapshot, body)
            .await
            .map_err(|e| self.error(format!("Failed to write {}: {}", snapshot.display(), e)))
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::discovery::{DiscoveryError, PageRangeDiscoverer};
    use crate::scrapers::extractor::PageExtractor;
    use crate::scrapers::rumah123::fixtures::LISTING_PAGE;
    use crate::scrapers::rumah123::LAYOUT;
    use crate::scrapers::types::{DiscoverySettings, ExtractSettings, ScrollPlan};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LISTINGS_PATH: &str = "/jual/bogor/rumah/";

    /// Serves `status` and `body` to every connection; returns the listing base URL
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = [0u8; 4096];
                    let _ = socket.read(&mut request).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}{}", addr, LISTINGS_PATH)
    }

    /// Accepts connections and never answers
    async fn silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _held = socket;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });
        format!("http://{}{}", addr, LISTINGS_PATH)
    }

    /// Direct connections only, whatever proxy the environment sets
    fn local_renderer() -> HttpRenderer {
        HttpRenderer::with_client(Client::builder().no_proxy().build().unwrap())
    }

    fn extract_settings(diagnostics: Option<std::path::PathBuf>) -> ExtractSettings {
        ExtractSettings {
            timeout: Duration::from_secs(5),
            scroll: ScrollPlan {
                settle: Duration::ZERO,
                ..ScrollPlan::default()
            },
            diagnostics_dir: diagnostics,
        }
    }

    #[tokio::test]
    async fn static_html_reaches_the_extractor() {
        let base = serve("200 OK", LISTING_PAGE).await;
        let renderer = local_renderer();
        let extractor = PageExtractor::new(&renderer, &LAYOUT, extract_settings(None));

        let records = extractor.extract_page(&base, 2).await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn scrolling_is_a_no_op_and_content_needs_a_page() {
        let renderer = local_renderer();
        let mut page = renderer.new_page().await.unwrap();

        assert!(page.scroll_by(1500).await.is_ok());
        assert!(page.scroll_to_bottom().await.is_ok());
        assert!(matches!(page.content().await, Err(RenderError::Browser { .. })));
    }

    #[tokio::test]
    async fn error_status_leaves_an_html_snapshot() {
        let base = serve("500 Internal Server Error", "<html>upstream down</html>").await;
        let dir = tempfile::tempdir().unwrap();
        // the diagnostics directory does not exist yet
        let diagnostics = dir.path().join("debug");
        let renderer = local_renderer();

        let mut page = renderer.new_page().await.unwrap();
        let err = page.goto(&base, Duration::from_secs(5)).await.unwrap_err();
        assert!(err.to_string().contains("500"));

        let extractor = PageExtractor::new(&renderer, &LAYOUT, extract_settings(Some(diagnostics.clone())));
        assert!(extractor.extract_page(&base, 4).await.is_empty());
        assert!(diagnostics.join("scraper_debug_page_4.html").exists());
        assert!(!diagnostics.join("scraper_debug_page_4.png").exists());
    }

    #[tokio::test]
    async fn unanswered_request_is_a_discovery_timeout() {
        let base = silent().await;
        let renderer = local_renderer();
        let settings = DiscoverySettings {
            timeout: Duration::from_millis(300),
            settle: Duration::ZERO,
            diagnostics_dir: None,
        };

        let err = PageRangeDiscoverer::new(&renderer, settings)
            .discover_max_page(&base)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Timeout { .. }));
    }
}
