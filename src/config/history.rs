//! A running log of completed scans, kept as `history.json` in the data directory.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::get_data_directory;

const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub root: PathBuf,
    pub scanned: usize,
    pub failed: usize,
}

impl HistoryEntry {
    pub fn new(root: impl Into<PathBuf>, scanned: usize, failed: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            root: root.into(),
            scanned,
            failed,
        }
    }
}

pub fn get_history_file_path(data_dir: Option<&Path>) -> Option<PathBuf> {
    data_dir
        .map(Path::to_path_buf)
        .or_else(get_data_directory)
        .map(|dir| dir.join(HISTORY_FILE))
}

/// Reads every recorded entry, oldest first. A missing file is an empty history.
pub fn load_history(data_dir: Option<&Path>) -> Result<Vec<HistoryEntry>> {
    let path = get_history_file_path(data_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn append_history(entry: HistoryEntry, data_dir: Option<&Path>) -> Result<()> {
    let path = get_history_file_path(data_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    let mut entries = match load_history(data_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Discarding unreadable history at {:?}: {}", path, e);
            Vec::new()
        }
    };
    entries.push(entry);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(&entries)?)?;
    tracing::debug!("Appended scan to history at {:?}", path);
    Ok(())
}
