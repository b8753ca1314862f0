//! Collecting document units from a file or directory

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::parser::FileParser;
use crate::error::{Error, Result};
use crate::types::{sort_units, DocumentUnit};

/// Turns one file into document units
pub trait Extractor: Send + Sync {
    /// Extract units from `path`, naming them `file_name`
    fn extract(&self, path: &Path, file_name: &str) -> Result<Vec<DocumentUnit>>;
}

/// Default extractor reading files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl Extractor for FileExtractor {
    fn extract(&self, path: &Path, file_name: &str) -> Result<Vec<DocumentUnit>> {
        let data = std::fs::read(path)
            .map_err(|e| Error::extraction(file_name, format!("read failed: {}", e)))?;
        FileParser::parse(file_name, &data)
    }
}

/// Gather units from a single file or every regular file of a directory.
///
/// Files that fail extraction are logged and skipped. The result is sorted
/// by file name then page number.
pub fn collect_units(
    path: &Path,
    extractor: &dyn Extractor,
    recursive: bool,
) -> Result<Vec<DocumentUnit>> {
    let files: Vec<(PathBuf, String)> = if path.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        vec![(path.to_path_buf(), name)]
    } else if path.is_dir() {
        list_files(path, recursive)
    } else {
        return Err(Error::Config(format!(
            "{} is neither a file nor a directory",
            path.display()
        )));
    };

    tracing::info!("Extracting {} file(s) from {}", files.len(), path.display());

    let mut units = Vec::new();
    let mut failed = 0usize;
    for (file_path, name) in &files {
        match extractor.extract(file_path, name) {
            Ok(file_units) => {
                tracing::debug!("{}: {} unit(s)", name, file_units.len());
                units.extend(file_units);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", name, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        tracing::warn!("{} of {} file(s) could not be extracted", failed, files.len());
    }

    sort_units(&mut units);
    Ok(units)
}

/// Regular files under `dir`, named relative to it
fn list_files(dir: &Path, recursive: bool) -> Vec<(PathBuf, String)> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();

    walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Cannot read directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let name = entry
                .path()
                .strip_prefix(dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            (entry.into_path(), name)
        })
        .collect()
}
