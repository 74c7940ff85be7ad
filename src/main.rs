mod config;
mod models;
mod pipeline;
mod scrapers;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use config::{Cli, Command, LauncherKind, RenderArgs, RendererKind, ScrapeArgs};
use models::{PageJob, PageRange, RegionSpec, REGIONS};
use pipeline::{DispatchReport, Dispatcher, DockerLauncher, ProcessLauncher, WorkerLauncher};
use scrapers::{ChromeRenderer, HttpRenderer, PageRangeDiscoverer, Renderer, LAYOUT};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging; stderr so worker logs end up in failure diagnostics
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Regions => {
            for (i, region) in REGIONS.iter().enumerate() {
                println!("{}: {} ({})", i + 1, region.key, region.base_url);
            }
            Ok(())
        }
        Command::Discover { region } => {
            let region = resolve_region(&region)?;
            let renderer = build_renderer(&cli.render)?;
            let max_page = PageRangeDiscoverer::new(renderer.as_ref(), cli.render.discovery_settings())
                .discover_max_page(region.base_url)
                .await?;
            println!("{}", max_page);
            Ok(())
        }
        Command::Scrape(args) => scrape(&cli.render, args).await,
        Command::Worker {
            base_url,
            page,
            output_dir,
        } => {
            let renderer = build_renderer(&cli.render)?;
            let job = PageJob { base_url, page };
            let path = pipeline::run_page_job(
                renderer.as_ref(),
                &LAYOUT,
                cli.render.extract_settings(),
                &job,
                &output_dir,
            )
            .await?;
            info!("✅ Page {} done: {}", page, path.display());
            Ok(())
        }
        Command::Merge { root, output } => {
            let summary = pipeline::merge(&root, &output)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

fn resolve_region(choice: &str) -> anyhow::Result<&'static RegionSpec> {
    RegionSpec::lookup(choice).ok_or_else(|| {
        let known: Vec<&str> = REGIONS.iter().map(|r| r.key).collect();
        anyhow!("Unknown region '{}'. Choose one of: {}", choice, known.join(", "))
    })
}

fn build_renderer(args: &RenderArgs) -> anyhow::Result<Box<dyn Renderer>> {
    Ok(match args.renderer {
        RendererKind::Chrome => Box::new(ChromeRenderer::launch(!args.no_sandbox)?),
        RendererKind::Http => Box::new(HttpRenderer::new()?),
    })
}

async fn scrape(render: &RenderArgs, args: ScrapeArgs) -> anyhow::Result<()> {
    let region = resolve_region(&args.region)?;
    info!("🏠 Selected region: {} ({})", region.name, region.base_url);

    // The browser is only needed for discovery; drop it before workers start
    let max_page = {
        let renderer = build_renderer(render)?;
        PageRangeDiscoverer::new(renderer.as_ref(), render.discovery_settings())
            .discover_max_page(region.base_url)
            .await
            .context("Could not determine the number of pages")?
    };

    let range = args.pages.within(max_page)?;
    let output_dir = args.output_root.join(region.key);
    info!("Scraping pages {} of {} for '{}'", range, max_page, region.key);

    let report = match args.launcher {
        LauncherKind::Process => {
            let launcher = ProcessLauncher::current_exe(render.to_args())?;
            dispatch(launcher, &args, region.base_url, range, &output_dir).await?
        }
        LauncherKind::Docker => {
            let launcher = DockerLauncher::new(args.image.clone());
            dispatch(launcher, &args, region.base_url, range, &output_dir).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("Individual CSV files are located in '{}'", output_dir.display());

    if !report.failed.is_empty() {
        for failure in &report.failed {
            error!("--- page {} ---\n{}", failure.page, failure.diagnostic);
        }
        bail!("{} of {} pages failed", report.failed.len(), range.len());
    }
    info!("You may now merge them with `rumah-scout merge`");
    Ok(())
}

async fn dispatch<L: WorkerLauncher + 'static>(
    launcher: L,
    args: &ScrapeArgs,
    base_url: &str,
    range: PageRange,
    output_dir: &Path,
) -> anyhow::Result<DispatchReport> {
    let dispatcher = Dispatcher::new(launcher, args.dispatch_settings());
    Ok(dispatcher.dispatch(base_url, range, output_dir).await?)
}
