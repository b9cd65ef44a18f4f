//! Aggregate statistics over a set of files on disk.

use super::error::CoreError;
use super::units::{lowest_unit_size, SizeUnit};
use crate::utils::paths::{provision_all, provision_default, RawPath};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionStats {
    pub total_size: u64,
    pub total_files: usize,
}

/// A set of file paths with eagerly computed size and extension totals.
///
/// Paths that do not point at an existing regular file stay in the set but
/// do not contribute to any total.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileCollection {
    paths: Vec<PathBuf>,
    total_size: u64,
    total_files: usize,
    extensions: BTreeMap<String, ExtensionStats>,
    #[serde(skip)]
    needs_reprocessing: bool,
}

impl FileCollection {
    pub fn new<I, P>(paths: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = P>,
        P: Into<RawPath>,
    {
        let paths = provision_all(paths)?;

        let mut collection = Self {
            paths,
            ..Default::default()
        };
        collection.process_files();
        Ok(collection)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// Per-extension totals keyed by lower-cased, dotted extension (`".jpg"`).
    /// Files without an extension are counted under `""`.
    pub fn extensions(&self) -> &BTreeMap<String, ExtensionStats> {
        &self.extensions
    }

    pub fn needs_reprocessing(&self) -> bool {
        self.needs_reprocessing
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn path_at(&self, index: usize) -> Option<String> {
        self.paths
            .get(index)
            .map(|path| path.to_string_lossy().into_owned())
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.paths.iter().position(|p| p == path)
    }

    /// Stats for one extension. The key may be given with or without the
    /// leading dot and in any case.
    pub fn extension(&self, key: &str) -> Result<&ExtensionStats, CoreError> {
        let normalized = normalize_extension_key(key);
        self.extensions
            .get(&normalized)
            .ok_or_else(|| CoreError::UnknownExtension(key.to_string()))
    }

    pub fn get_total_size_in_lowest_unit(&self) -> (f64, SizeUnit) {
        lowest_unit_size(self.total_size)
    }

    pub fn get_total_extension_size_in_lowest_unit(&self, key: &str) -> Result<(f64, SizeUnit), CoreError> {
        Ok(lowest_unit_size(self.extension(key)?.total_size))
    }

    /// Drops `path` from the collection and refreshes the totals.
    ///
    /// Returns `false` when the path was not part of the collection. The file
    /// on disk is left alone.
    pub fn remove_file(&mut self, path: impl Into<RawPath>) -> Result<bool, CoreError> {
        let path = provision_default(path)?;
        let Some(index) = self.position(&path) else {
            tracing::debug!("{} is not part of the collection", path.display());
            return Ok(false);
        };

        self.paths.remove(index);
        self.needs_reprocessing = true;
        self.reprocess_files();
        Ok(true)
    }

    /// Recomputes every total, but only if something changed since the last run.
    pub fn reprocess_files(&mut self) {
        if !self.needs_reprocessing {
            return;
        }
        self.total_size = 0;
        self.total_files = 0;
        self.extensions.clear();
        self.process_files();
        self.needs_reprocessing = false;
    }

    fn process_files(&mut self) {
        let sizes: Vec<(String, u64)> = self
            .paths
            .par_iter()
            .filter_map(|path| {
                let metadata = std::fs::metadata(path).ok()?;
                metadata
                    .is_file()
                    .then(|| (extension_key(path), metadata.len()))
            })
            .collect();

        for (key, size) in sizes {
            self.total_size += size;
            self.total_files += 1;
            let stats = self.extensions.entry(key).or_default();
            stats.total_size += size;
            stats.total_files += 1;
        }

        tracing::debug!(
            "Processed {} path(s): {} file(s), {} byte(s)",
            self.paths.len(),
            self.total_files,
            self.total_size
        );
    }
}

fn extension_key(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn normalize_extension_key(key: &str) -> String {
    let key = key.trim().to_lowercase();
    if key.is_empty() || key.starts_with('.') {
        key
    } else {
        format!(".{key}")
    }
}

impl Index<usize> for FileCollection {
    type Output = Path;

    fn index(&self, index: usize) -> &Self::Output {
        &self.paths[index]
    }
}

impl fmt::Display for FileCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (size, unit) = self.get_total_size_in_lowest_unit();
        write!(
            f,
            "Total size: {} {}, Total files: {}",
            size, unit, self.total_files
        )
    }
}
