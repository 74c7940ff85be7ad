//! In-memory renderer serving canned HTML, for tests.

use crate::scrapers::traits::{PageSession, RenderError, Renderer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Canned {
    Html(String),
    Timeout,
}

#[derive(Default)]
pub struct FixtureRenderer {
    pages: Arc<HashMap<String, Canned>>,
    visits: Arc<Mutex<Vec<String>>>,
}

impl FixtureRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, url: &str, canned: Canned) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), canned);
        self
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with(url, Canned::Html(html.to_string()))
    }

    pub fn with_timeout(self, url: &str) -> Self {
        self.with(url, Canned::Timeout)
    }

    /// URLs navigated to so far, in order
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, RenderError> {
        Ok(Box::new(FixtureSession {
            pages: Arc::clone(&self.pages),
            visits: Arc::clone(&self.visits),
            current: None,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "fixture"
    }
}

struct FixtureSession {
    pages: Arc<HashMap<String, Canned>>,
    visits: Arc<Mutex<Vec<String>>>,
    current: Option<String>,
}

#[async_trait]
impl PageSession for FixtureSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        self.visits.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Canned::Html(html)) => self.current = Some(html.clone()),
            Some(Canned::Timeout) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                    after: timeout,
                })
            }
            None => self.current = Some("<html><body></body></html>".to_string()),
        }
        Ok(())
    }

    async fn scroll_by(&mut self, _px: u32) -> Result<(), RenderError> {
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.current.clone().ok_or_else(|| RenderError::Browser {
            url: String::new(),
            message: "no page loaded".to_string(),
        })
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), RenderError> {
        std::fs::write(path, b"fixture").map_err(|e| RenderError::Browser {
            url: path.display().to_string(),
            message: e.to_string(),
        })
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}
