use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Incremental scrolling used to make lazy-loaded cards materialize
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScrollPlan {
    /// Number of scroll steps
    pub steps: u32,
    /// Pixels scrolled per step
    pub step_px: u32,
    /// Pause after each step
    pub settle: Duration,
}

impl Default for ScrollPlan {
    fn default() -> Self {
        Self {
            steps: 5,
            step_px: 1500,
            settle: Duration::from_secs(1),
        }
    }
}

/// Parameters for scraping one listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSettings {
    /// Navigation budget; listing pages are heavier than page 1 probes
    pub timeout: Duration,
    pub scroll: ScrollPlan,
    /// Where screenshots of empty or failed pages are written
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            scroll: ScrollPlan::default(),
            diagnostics_dir: Some(PathBuf::from(".")),
        }
    }
}

/// Parameters for reading the page count of a region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    pub timeout: Duration,
    /// Pause after the full-height scroll so the pagination control renders
    pub settle: Duration,
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            settle: Duration::from_secs(2),
            diagnostics_dir: Some(PathBuf::from(".")),
        }
    }
}
