use crate::models::PageRange;
use crate::pipeline::DispatchSettings;
use crate::scrapers::{DiscoverySettings, ExtractSettings, ScrollPlan};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rumah-scout", author, version, about = "Scrapes rumah123.com house listings into one CSV dataset")]
pub struct Cli {
    #[command(flatten)]
    pub render: RenderArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererKind {
    /// Headless Chrome, runs page scripts
    Chrome,
    /// Plain HTTP fetch, static HTML only
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LauncherKind {
    /// Child processes of this binary
    Process,
    /// One docker container per page
    Docker,
}

/// Options shared by every command that renders pages
#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Rendering backend
    #[arg(long, global = true, value_enum, default_value_t = RendererKind::Chrome, env = "SCOUT_RENDERER")]
    pub renderer: RendererKind,

    /// Where screenshots of empty or failed pages are saved
    #[arg(long, global = true, default_value = ".", env = "SCOUT_DIAGNOSTICS_DIR")]
    pub diagnostics_dir: PathBuf,

    /// Run Chrome without its sandbox (needed inside most containers)
    #[arg(long, global = true, env = "SCOUT_NO_SANDBOX")]
    pub no_sandbox: bool,
}

impl RenderArgs {
    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            scroll: ScrollPlan::default(),
            diagnostics_dir: Some(self.diagnostics_dir.clone()),
            ..ExtractSettings::default()
        }
    }

    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            diagnostics_dir: Some(self.diagnostics_dir.clone()),
            ..DiscoverySettings::default()
        }
    }

    /// The same options as command-line arguments, for spawned workers
    pub fn to_args(&self) -> Vec<String> {
        let renderer = match self.renderer {
            RendererKind::Chrome => "chrome",
            RendererKind::Http => "http",
        };
        let mut args = vec![
            "--renderer".to_string(),
            renderer.to_string(),
            "--diagnostics-dir".to_string(),
            self.diagnostics_dir.display().to_string(),
        ];
        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }
        args
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the supported regions
    Regions,

    /// Print how many listing pages a region has
    Discover {
        /// Region key (e.g. bogor) or menu number (1-6)
        #[arg(short, long, env = "SCOUT_REGION")]
        region: String,
    },

    /// Discover a region's pages, then scrape a range of them in parallel workers
    Scrape(ScrapeArgs),

    /// Scrape a single page into its partial CSV file
    Worker {
        /// Region listing URL, e.g. https://www.rumah123.com/jual/bogor/rumah/
        base_url: String,

        /// Page number to scrape
        page: u32,

        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Merge every partial CSV under a directory into one file
    Merge {
        #[arg(long, default_value = "output", env = "SCOUT_OUTPUT_ROOT")]
        root: PathBuf,

        #[arg(short, long, default_value = "properties_combined.csv")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Region key (e.g. bogor) or menu number (1-6)
    #[arg(short, long, env = "SCOUT_REGION")]
    pub region: String,

    /// Inclusive page range, e.g. 1-10
    #[arg(short, long)]
    pub pages: PageRange,

    #[arg(long, value_enum, default_value_t = LauncherKind::Process, env = "SCOUT_LAUNCHER")]
    pub launcher: LauncherKind,

    /// Worker image used by the docker launcher
    #[arg(long, default_value = "rumah123-scraper", env = "SCOUT_IMAGE")]
    pub image: String,

    /// Workers running at once, 0 for no limit
    #[arg(long, default_value_t = 4, env = "SCOUT_CONCURRENCY")]
    pub concurrency: usize,

    /// Seconds before a worker is stopped, 0 for no deadline
    #[arg(long, default_value_t = 180, env = "SCOUT_WORKER_TIMEOUT_SECS")]
    pub worker_timeout_secs: u64,

    /// Partial files go to `{output_root}/{region}`
    #[arg(long, default_value = "output", env = "SCOUT_OUTPUT_ROOT")]
    pub output_root: PathBuf,
}

impl ScrapeArgs {
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            max_concurrency: (self.concurrency > 0).then_some(self.concurrency),
            worker_timeout: (self.worker_timeout_secs > 0).then(|| Duration::from_secs(self.worker_timeout_secs)),
        }
    }
}
