use crate::models::ListingRecord;
use csv::WriterBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PartialWriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Deterministic partial file name for a page
pub fn partial_file_name(page: u32) -> String {
    format!("properties_page_{}.csv", page)
}

/// Write one page's records as `properties_page_{page}.csv` in `dir`.
///
/// The header is always written, so a page without listings still leaves a
/// (header-only) file behind. The file only appears once complete.
pub fn write_partial(dir: &Path, page: u32, records: &[ListingRecord]) -> Result<PathBuf, PartialWriteError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PartialWriteError::Io { path, source }
    };

    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let name = partial_file_name(page);
    let path = dir.join(&name);
    let staging = dir.join(format!("{}.tmp", name));

    {
        let csv_err = |source| PartialWriteError::Csv {
            path: staging.clone(),
            source,
        };
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&staging)
            .map_err(csv_err)?;
        writer.write_record(ListingRecord::COLUMNS).map_err(csv_err)?;
        for record in records {
            writer.serialize(record).map_err(csv_err)?;
        }
        writer.flush().map_err(io_err(staging.as_path()))?;
    }

    fs::rename(&staging, &path).map_err(io_err(path.as_path()))?;
    info!("💾 Saved {} listings to {}", records.len(), path.display());
    Ok(path)
}
