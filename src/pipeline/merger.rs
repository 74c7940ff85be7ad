use crate::models::UNAVAILABLE;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no CSV files found in '{}' or its subdirectories", .0.display())]
    NoFilesFound(PathBuf),
    #[error("all {files} CSV files under '{}' were empty or unreadable, no output file created", root.display())]
    NothingToMerge { root: PathBuf, files: usize },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Data rows written, headers excluded
    pub rows: usize,
    pub files_found: usize,
    pub files_merged: usize,
    pub skipped: Vec<PathBuf>,
}

/// A parsed partial file with at least one data row
struct Table {
    header: StringRecord,
    rows: Vec<StringRecord>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> MergeError {
    let path = path.to_path_buf();
    move |source| MergeError::Io { path, source }
}

/// Every `*.csv` below `root`, in sorted path order so repeated merges see
/// the same sequence. `exclude` (usually the merge output) is skipped.
pub fn discover_partials(root: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>, MergeError> {
    let excluded = exclude.and_then(|p| fs::canonicalize(p).ok());
    let mut found = Vec::new();
    if root.is_dir() {
        walk(root, excluded.as_deref(), &mut found)?;
    }
    Ok(found)
}

fn walk(dir: &Path, excluded: Option<&Path>, found: &mut Vec<PathBuf>) -> Result<(), MergeError> {
    let mut entries = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(dir))?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, excluded, found)?;
        } else if path.extension().is_some_and(|ext| ext == "csv") {
            if excluded.is_some() && fs::canonicalize(&path).ok().as_deref() == excluded {
                debug!("Skipping merge output {}", path.display());
                continue;
            }
            found.push(path);
        }
    }
    Ok(())
}

/// `None` for a zero-byte or header-only file
fn read_table(path: &Path) -> Result<Option<Table>, MergeError> {
    let read_err = |source| MergeError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path).map_err(read_err)?;

    let header = reader.headers().map_err(read_err)?.clone();
    if header.is_empty() {
        return Ok(None);
    }
    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(Table { header, rows }))
}

/// Concatenate every non-empty partial file under `root` into `output`.
///
/// Rows keep their in-file order and files keep discovery order. Columns are
/// the union of all headers in first-seen order; a cell a file does not have
/// is written as the unavailable sentinel. Input files are left untouched.
pub fn merge(root: &Path, output: &Path) -> Result<MergeSummary, MergeError> {
    let files = discover_partials(root, Some(output))?;
    if files.is_empty() {
        return Err(MergeError::NoFilesFound(root.to_path_buf()));
    }
    info!("Found {} CSV files to merge.", files.len());

    let mut tables = Vec::new();
    let mut skipped = Vec::new();
    for path in &files {
        match read_table(path) {
            Ok(Some(table)) => tables.push(table),
            Ok(None) => {
                warn!("'{}' is empty and will be skipped.", path.display());
                skipped.push(path.clone());
            }
            Err(e) => {
                warn!("{}, skipping it.", e);
                skipped.push(path.clone());
            }
        }
    }

    if tables.is_empty() {
        return Err(MergeError::NothingToMerge {
            root: root.to_path_buf(),
            files: files.len(),
        });
    }

    let mut columns: Vec<String> = Vec::new();
    for table in &tables {
        for name in table.header.iter() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let write_err = |source| MergeError::Write {
        path: output.to_path_buf(),
        source,
    };
    let mut writer = WriterBuilder::new().from_path(output).map_err(write_err)?;
    writer.write_record(&columns).map_err(write_err)?;

    let mut rows = 0;
    for table in &tables {
        let position: HashMap<&str, usize> = table.header.iter().enumerate().map(|(i, name)| (name, i)).collect();
        for row in &table.rows {
            let cells = columns.iter().map(|column| {
                position
                    .get(column.as_str())
                    .and_then(|i| row.get(*i))
                    .unwrap_or(UNAVAILABLE)
            });
            writer.write_record(cells).map_err(write_err)?;
            rows += 1;
        }
    }
    writer.flush().map_err(io_error(output))?;

    info!(
        "✅ Success! Merged {} files from {} total files into '{}' ({} rows).",
        tables.len(),
        files.len(),
        output.display(),
        rows
    );

    Ok(MergeSummary {
        rows,
        files_found: files.len(),
        files_merged: tables.len(),
        skipped,
    })
}
