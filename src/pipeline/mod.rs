pub mod dispatcher;
pub mod launcher;
pub mod merger;
pub mod partial;

pub use dispatcher::{DispatchReport, DispatchSettings, Dispatcher};
pub use launcher::{DockerLauncher, ProcessLauncher, WorkerLauncher};
pub use merger::merge;
pub use partial::write_partial;

use crate::models::PageJob;
use crate::scrapers::{CatalogLayout, ExtractSettings, PageExtractor, Renderer};
use std::path::{Path, PathBuf};

/// Body of one worker: scrape the job's page and write its partial file
pub async fn run_page_job(
    renderer: &dyn Renderer,
    layout: &CatalogLayout,
    settings: ExtractSettings,
    job: &PageJob,
    output_dir: &Path,
) -> Result<PathBuf, partial::PartialWriteError> {
    let extractor = PageExtractor::new(renderer, layout, settings);
    let records = extractor.extract_page(&job.base_url, job.page).await;
    write_partial(output_dir, job.page, &records)
}
