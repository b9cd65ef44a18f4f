//! Finding picture files below a directory.

use super::error::CoreError;
use super::file_collection::FileCollection;
use crate::utils::paths::{provision_default, RawPath};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub const PICTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff"];

pub fn is_picture_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PICTURE_EXTENSIONS.iter().any(|p| p.eq_ignore_ascii_case(ext)))
}

/// Collects picture files under `dir`, sorted by path.
///
/// Directories whose name matches an entry of `exclude_dir_names`
/// (case-insensitively) are not descended into. Symlinks are not followed.
pub fn gather_picture_files(
    dir: impl Into<RawPath>,
    recursive: bool,
    exclude_dir_names: &[String],
) -> Result<Vec<PathBuf>, CoreError> {
    let root = provision_default(dir)?;
    if !root.is_dir() {
        return Err(CoreError::NotADirectory(root));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut pictures = Vec::new();

    for entry in WalkDir::new(&root)
        .follow_links(false)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_excluded_dir(entry, exclude_dir_names))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_picture_file(entry.path()) {
            pictures.push(entry.into_path());
        }
    }

    tracing::info!("📂 Found {} picture(s) in {}", pictures.len(), root.display());
    Ok(pictures)
}

fn is_excluded_dir(entry: &DirEntry, exclude_dir_names: &[String]) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| exclude_dir_names.iter().any(|ex| ex.eq_ignore_ascii_case(name)))
}

impl FileCollection {
    /// Builds a collection from the pictures found under `dir`.
    pub fn from_directory(
        dir: impl Into<RawPath>,
        recursive: bool,
        exclude_dir_names: &[String],
    ) -> Result<Self, CoreError> {
        FileCollection::new(gather_picture_files(dir, recursive, exclude_dir_names)?)
    }
}
