use crate::scrapers::traits::{PageSession, RenderError, Renderer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Chrome keeps its own per-call timeout slightly above ours so that
/// `tokio::time::timeout` is what reports the overrun.
const CHROME_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Pause after the load event, standing in for a network-idle wait
const NETWORK_SETTLE: Duration = Duration::from_secs(2);

/// Renderer backed by headless Chrome
pub struct ChromeRenderer {
    browser: Arc<Browser>,
}

impl ChromeRenderer {
    /// Launch a headless Chrome instance. `sandbox` must be off inside
    /// most containers.
    pub fn launch(sandbox: bool) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(sandbox)
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser: Arc::new(browser),
        })
    }
}

/// Run a blocking Chrome call off the async runtime
async fn blocking<T, F>(url: &str, f: F) -> Result<T, RenderError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let browser_error = |message: String| RenderError::Browser {
        url: url.to_string(),
        message,
    };
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| browser_error(e.to_string()))?
        .map_err(|e| browser_error(format!("{:#}", e)))
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, RenderError> {
        let browser = Arc::clone(&self.browser);
        let tab = blocking("about:blank", move || Ok(browser.new_tab()?)).await?;
        Ok(Box::new(ChromePage {
            tab,
            url: "about:blank".to_string(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "chrome"
    }
}

struct ChromePage {
    tab: Arc<Tab>,
    url: String,
}

impl ChromePage {
    async fn evaluate(&self, script: &'static str) -> Result<Option<serde_json::Value>, RenderError> {
        let tab = Arc::clone(&self.tab);
        blocking(&self.url, move || Ok(tab.evaluate(script, false)?.value)).await
    }
}

#[async_trait]
impl PageSession for ChromePage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        self.url = url.to_string();
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();

        let navigation = blocking(url, move || {
            tab.set_default_timeout(timeout + CHROME_TIMEOUT_GRACE);
            tab.navigate_to(&target)?;
            tab.wait_until_navigated()?;
            Ok(())
        });

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                    after: timeout,
                })
            }
        }

        tokio::time::sleep(NETWORK_SETTLE).await;
        debug!("Loaded {}", url);
        Ok(())
    }

    async fn scroll_by(&mut self, px: u32) -> Result<(), RenderError> {
        let tab = Arc::clone(&self.tab);
        let script = format!("window.scrollBy(0, {})", px);
        blocking(&self.url, move || {
            tab.evaluate(&script, false)?;
            Ok(())
        })
        .await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)").await?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        let value = self.evaluate("document.documentElement.outerHTML").await?;
        match value.as_ref().and_then(|v| v.as_str()) {
            Some(html) if !html.is_empty() => {
                debug!("Captured {} bytes of HTML from {}", html.len(), self.url);
                Ok(html.to_string())
            }
            _ => Err(RenderError::Browser {
                url: self.url.clone(),
                message: "page returned no HTML".to_string(),
            }),
        }
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), RenderError> {
        let tab = Arc::clone(&self.tab);
        let path = path.to_path_buf();
        blocking(&self.url, move || {
            let png = tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))
        })
        .await
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        let tab = Arc::clone(&self.tab);
        blocking(&self.url, move || {
            tab.close(true)?;
            Ok(())
        })
        .await
    }
}
